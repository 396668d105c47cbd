use crate::config::OperationKind;
use serde::Serialize;

/// Wizard pages in the order they are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    RemoteIdentity,
    Mount,
    Serve,
    Sync,
    Bisync,
    Move,
    Copy,
    Filter,
    Vfs,
    Backend,
}

impl WizardStep {
    pub const ORDER: [WizardStep; 10] = [
        WizardStep::RemoteIdentity,
        WizardStep::Mount,
        WizardStep::Serve,
        WizardStep::Sync,
        WizardStep::Bisync,
        WizardStep::Move,
        WizardStep::Copy,
        WizardStep::Filter,
        WizardStep::Vfs,
        WizardStep::Backend,
    ];

    /// Operation kind edited on this page
    pub fn kind(&self) -> Option<OperationKind> {
        match self {
            WizardStep::RemoteIdentity => None,
            WizardStep::Mount => Some(OperationKind::Mount),
            WizardStep::Serve => Some(OperationKind::Serve),
            WizardStep::Sync => Some(OperationKind::Sync),
            WizardStep::Bisync => Some(OperationKind::Bisync),
            WizardStep::Move => Some(OperationKind::Move),
            WizardStep::Copy => Some(OperationKind::Copy),
            WizardStep::Filter => Some(OperationKind::Filter),
            WizardStep::Vfs => Some(OperationKind::Vfs),
            WizardStep::Backend => Some(OperationKind::Backend),
        }
    }

    pub fn for_kind(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Mount => WizardStep::Mount,
            OperationKind::Serve => WizardStep::Serve,
            OperationKind::Sync => WizardStep::Sync,
            OperationKind::Bisync => WizardStep::Bisync,
            OperationKind::Move => WizardStep::Move,
            OperationKind::Copy => WizardStep::Copy,
            OperationKind::Filter => WizardStep::Filter,
            OperationKind::Vfs => WizardStep::Vfs,
            OperationKind::Backend => WizardStep::Backend,
        }
    }
}

/// What the wizard was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "kind", rename_all = "camelCase")]
pub enum WizardMode {
    /// A brand-new remote
    Create,
    /// One operation kind of an existing remote
    EditKind(OperationKind),
    /// Identity and type of an existing remote; any downstream schema may change
    EditRemote,
}

impl WizardMode {
    pub fn is_applicable(&self, step: WizardStep) -> bool {
        match self {
            WizardMode::Create | WizardMode::EditRemote => true,
            WizardMode::EditKind(kind) => step.kind() == Some(*kind),
        }
    }

    pub fn steps(&self) -> Vec<WizardStep> {
        WizardStep::ORDER
            .iter()
            .copied()
            .filter(|step| self.is_applicable(*step))
            .collect()
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        self.steps().iter().filter_map(WizardStep::kind).collect()
    }

    pub fn first_step(&self) -> WizardStep {
        match self {
            WizardMode::EditKind(kind) => WizardStep::for_kind(*kind),
            _ => WizardStep::RemoteIdentity,
        }
    }
}
