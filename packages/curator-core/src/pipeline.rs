use crate::change::{Change, PayloadSet, PayloadType};
use crate::changelog::{ChangeCollector, Changelog};
use crate::error::Result;
use crate::front_matter::FrontMatterCollector;
use crate::parallel::PassContext;
use crate::vault::Vault;
use tracing::debug;

/// What a stage can see while it runs.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    /// The vault, already updated with the change that started the pass.
    pub vault: &'a Vault,
    pub front_matter: &'a FrontMatterCollector,
    pub pass: &'a PassContext,
}

impl<'a> StageContext<'a> {
    pub fn new(
        vault: &'a Vault,
        front_matter: &'a FrontMatterCollector,
        pass: &'a PassContext,
    ) -> Self {
        Self {
            vault,
            front_matter,
            pass,
        }
    }
}

/// A long-lived, stateful step of the pipeline.
///
/// A stage declares which payload types it consumes and produces; the
/// orchestrator uses these declarations to order stages once at startup and
/// to check every run's output. Stages run one at a time, so implementations
/// need no internal locking for their own state.
pub trait Stage: Send {
    fn name(&self) -> &str;

    /// Payload types this stage reacts to. Must not be empty.
    fn consumes(&self) -> PayloadSet;

    /// Payload types this stage may emit. Must not include reserved types.
    fn produces(&self) -> PayloadSet {
        PayloadSet::empty()
    }

    /// Whether the state must be rebuilt instead of updated incrementally.
    fn requires_full_refresh(&self, changelog: &Changelog) -> bool {
        changelog.contains(PayloadType::Vault)
    }

    /// Rebuilds all state from the vault, emitting it as `Create` changes.
    fn refresh(&mut self, context: &StageContext<'_>, output: &mut ChangeCollector) -> Result<()>;

    /// Updates the state for a single change.
    fn apply(
        &mut self,
        change: &Change,
        context: &StageContext<'_>,
        output: &mut ChangeCollector,
    ) -> Result<()>;

    /// Processes the changes of one pass, already filtered to [`Self::consumes`].
    fn run(&mut self, changelog: &Changelog, context: &StageContext<'_>) -> Result<Changelog> {
        let mut output = ChangeCollector::new();
        if self.requires_full_refresh(changelog) {
            debug!("Stage '{}' refreshes from scratch", self.name());
            self.refresh(context, &mut output)?;
        } else {
            for change in changelog.changes() {
                self.apply(change, context, &mut output)?;
            }
        }
        Ok(output.into_changelog())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Payload;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recording {
        refreshed: usize,
        applied: Vec<Change>,
    }

    impl Stage for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn consumes(&self) -> PayloadSet {
            PayloadSet::RESERVED
        }

        fn refresh(&mut self, _context: &StageContext<'_>, _output: &mut ChangeCollector) -> Result<()> {
            self.refreshed += 1;
            Ok(())
        }

        fn apply(
            &mut self,
            change: &Change,
            _context: &StageContext<'_>,
            _output: &mut ChangeCollector,
        ) -> Result<()> {
            self.applied.push(change.clone());
            Ok(())
        }
    }

    #[test]
    fn test_vault_change_forces_full_refresh() {
        let vault = Vault::new("test");
        let front_matter = FrontMatterCollector::new();
        let pass = PassContext::new(Arc::from("test"), 1);
        let context = StageContext::new(&vault, &front_matter, &pass);
        let mut stage = Recording::default();

        let folder = Change::create(Payload::Folder(Arc::from("x")));
        stage
            .run(
                &Changelog::from(vec![folder.clone(), Change::touch(Payload::Vault)]),
                &context,
            )
            .unwrap();
        assert_eq!(stage.refreshed, 1);
        assert!(stage.applied.is_empty());

        stage.run(&Changelog::of(folder.clone()), &context).unwrap();
        assert_eq!(stage.refreshed, 1);
        assert_eq!(stage.applied, vec![folder]);
    }
}
