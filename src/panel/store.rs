use std::collections::{BTreeMap, HashMap};

use tokio::sync::watch;

use super::gate::{Affordances, CommandGate};
use crate::device::{
    command::{DeviceCommand, DraftKind},
    light::{LightId, LightState},
    status::{ControlMode, ControlParameters, DeviceStatus},
};

/// Monotonic stamp handed out by the store. Poll fetches and dispatches are
/// stamped when issued, drafts when they are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seq(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingEdit {
    TargetLux(f64),
    ControlParameters(ControlParameters),
}

impl PendingEdit {
    pub fn kind(&self) -> DraftKind {
        match self {
            PendingEdit::TargetLux(_) => DraftKind::TargetLux,
            PendingEdit::ControlParameters(_) => DraftKind::ControlParameters,
        }
    }

    pub fn to_command(self) -> DeviceCommand {
        match self {
            PendingEdit::TargetLux(lux) => DeviceCommand::SetTargetIlluminance(lux),
            PendingEdit::ControlParameters(params) => DeviceCommand::SetControlParameters(params),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Stamped<T> {
    value: T,
    seq: Seq,
}

/// What the panel should display right now.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub status: Option<DeviceStatus>,
    pub target_lux: Option<f64>,
    pub target_lux_is_draft: bool,
    pub control_parameters: Option<ControlParameters>,
    pub control_parameters_is_draft: bool,
    pub affordances: Affordances,
}

/// Last known device status plus the operator's unsent edits.
pub struct StatusStore {
    next_seq: u64,
    status: Option<Stamped<DeviceStatus>>,
    drafts: HashMap<DraftKind, Stamped<PendingEdit>>,
    acknowledged_parameters: Option<ControlParameters>,
    acknowledged_target: Option<Stamped<f64>>,
    lights: BTreeMap<LightId, LightState>,
    revision: watch::Sender<u64>,
}

impl Default for StatusStore {
    fn default() -> Self {
        StatusStore::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);

        StatusStore {
            next_seq: 0,
            status: None,
            drafts: HashMap::new(),
            acknowledged_parameters: None,
            acknowledged_target: None,
            lights: BTreeMap::new(),
            revision,
        }
    }

    /// Receiver that changes every time something displayed may have changed.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn changed(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    pub fn issue(&mut self) -> Seq {
        self.next_seq += 1;
        Seq(self.next_seq)
    }

    pub fn current_status(&self) -> Option<&DeviceStatus> {
        self.status.as_ref().map(|s| &s.value)
    }

    pub fn control_mode(&self) -> Option<ControlMode> {
        self.current_status().map(|s| s.control_mode)
    }

    /// Replaces the displayed status with a poll result. Never suppressed by
    /// drafts or by earlier dispatch acknowledgements.
    pub fn apply_polled(&mut self, status: DeviceStatus, issued: Seq) {
        self.status = Some(Stamped {
            value: status,
            seq: issued,
        });
        self.changed();
    }

    /// Applies a status echoed back by a command acknowledgement, unless a
    /// poll issued after the command was sent has already been displayed.
    /// Returns whether the status was applied.
    pub fn apply_acknowledged(&mut self, status: DeviceStatus, sent: Seq) -> bool {
        if let Some(current) = &self.status {
            if current.seq > sent {
                return false;
            }
        }

        self.apply_polled(status, sent);
        true
    }

    pub fn draft(&self, kind: DraftKind) -> Option<PendingEdit> {
        self.drafts.get(&kind).map(|d| d.value)
    }

    pub fn set_draft(&mut self, edit: PendingEdit) -> Seq {
        let seq = self.issue();
        self.drafts.insert(edit.kind(), Stamped { value: edit, seq });
        self.changed();

        seq
    }

    pub fn clear_draft(&mut self, kind: DraftKind) {
        if self.drafts.remove(&kind).is_some() {
            self.changed();
        }
    }

    /// Drops every draft, as when the operator navigates away.
    pub fn clear_drafts(&mut self) {
        if !self.drafts.is_empty() {
            self.drafts.clear();
            self.changed();
        }
    }

    /// Clears the draft a successful dispatch delivered. A draft edited after
    /// the dispatch was sent is newer than what the service acknowledged and
    /// is kept.
    pub fn settle_draft(&mut self, kind: DraftKind, sent: Seq) -> bool {
        match self.drafts.get(&kind) {
            Some(draft) if draft.seq <= sent => {
                self.clear_draft(kind);
                true
            }
            _ => false,
        }
    }

    pub fn acknowledged_parameters(&self) -> Option<ControlParameters> {
        self.acknowledged_parameters
    }

    pub fn light(&self, light: &LightId) -> Option<&LightState> {
        self.lights.get(light)
    }

    /// Target the controller acknowledged, until a status polled after the
    /// acknowledged send is displayed.
    pub fn acknowledged_target(&self) -> Option<f64> {
        let acknowledged = self.acknowledged_target.as_ref()?;

        match &self.status {
            Some(status) if status.seq > acknowledged.seq => None,
            _ => Some(acknowledged.value),
        }
    }

    /// Records the effect of an acknowledged command that was sent at `sent`
    /// and has no status endpoint to read it back from.
    pub fn record_acknowledged(&mut self, command: &DeviceCommand, sent: Seq) {
        if let DeviceCommand::SetTargetIlluminance(lux) = command {
            self.acknowledged_target = Some(Stamped {
                value: *lux,
                seq: sent,
            });
        } else if let DeviceCommand::SetControlParameters(params) = command {
            self.acknowledged_parameters = Some(*params);
        } else if let Some((light, patch)) = command.light_patch() {
            self.lights.entry(light).or_default().merge(patch);
        } else {
            return;
        }

        self.changed();
    }

    pub fn view(&self) -> StatusView {
        let status = self.current_status().cloned();
        let mode = self.control_mode();
        let affordances = CommandGate::affordances(mode);

        // In automatic mode the target is read-only and shows what the
        // controller reports, even if a draft is pending.
        let target_draft = match self.draft(DraftKind::TargetLux) {
            Some(PendingEdit::TargetLux(lux)) if affordances.target_lux => Some(lux),
            _ => None,
        };
        let reported_target = self
            .acknowledged_target()
            .or(status.as_ref().and_then(|s| s.target_lux));

        let parameters_draft = match self.draft(DraftKind::ControlParameters) {
            Some(PendingEdit::ControlParameters(params)) => Some(params),
            _ => None,
        };

        StatusView {
            target_lux: target_draft.or(reported_target),
            target_lux_is_draft: target_draft.is_some(),
            control_parameters: parameters_draft.or(self.acknowledged_parameters()),
            control_parameters_is_draft: parameters_draft.is_some(),
            status,
            affordances,
        }
    }
}
