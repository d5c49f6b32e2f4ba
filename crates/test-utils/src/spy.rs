//! Recording [`SliceHost`] for controller tests.
//!
//! The spy resolves volumes and rulers from in-memory maps and records every
//! write. When an echo mode is set it behaves like a scene that notifies
//! observers: ruler writes raise `RulerEndpointsChanged` and parameter
//! publications raise `AngleOrShiftChanged`, either immediately (from inside
//! the write) or later via [`SpyHost::flush_echoes`].

use std::collections::HashMap;
use std::rc::Rc;

use astro_common::{RulerId, Volume, VolumeId};
use nalgebra::Matrix4;
use pv_slice::{
    Result, SliceError, SliceEvent, SliceGeometryController, SliceHost, SliceParameters,
    SyncOutcome,
};

/// How the spy reacts to the controller's writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoMode {
    /// No notifications.
    Silent,
    /// Notify the controller from inside the write.
    Immediate,
    /// Queue notifications until [`SpyHost::flush_echoes`].
    Deferred,
}

#[derive(Debug)]
pub struct SpyHost {
    pub volumes: HashMap<VolumeId, Volume>,
    pub rulers: HashMap<RulerId, [[f64; 3]; 2]>,
    pub ruler_writes: Vec<(RulerId, [[f64; 3]; 2])>,
    pub reslices: Vec<(VolumeId, Matrix4<f64>)>,
    pub published: Vec<SliceParameters>,
    /// Outcomes of notifications the spy delivered back to the controller.
    pub echo_outcomes: Vec<Result<SyncOutcome>>,
    /// When set, ruler writes fail with this message.
    pub reject_writes: Option<String>,
    echo_mode: EchoMode,
    controller: Option<Rc<SliceGeometryController>>,
    pending: Vec<SliceEvent>,
}

impl SpyHost {
    pub fn new() -> Self {
        Self {
            volumes: HashMap::new(),
            rulers: HashMap::new(),
            ruler_writes: Vec::new(),
            reslices: Vec::new(),
            published: Vec::new(),
            echo_outcomes: Vec::new(),
            reject_writes: None,
            echo_mode: EchoMode::Silent,
            controller: None,
            pending: Vec::new(),
        }
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.insert(volume.id.clone(), volume);
        self
    }

    pub fn with_ruler(mut self, id: &str, endpoints: [[f64; 3]; 2]) -> Self {
        self.rulers.insert(RulerId::new(id), endpoints);
        self
    }

    /// Deliver notifications to `controller` according to `mode`.
    pub fn echo_to(&mut self, controller: Rc<SliceGeometryController>, mode: EchoMode) {
        self.controller = Some(controller);
        self.echo_mode = mode;
    }

    /// Move a ruler as a user would, without notifying anyone.
    pub fn drag_ruler(&mut self, id: &str, endpoints: [[f64; 3]; 2]) {
        self.rulers.insert(RulerId::new(id), endpoints);
    }

    pub fn ruler(&self, id: &str) -> Option<[[f64; 3]; 2]> {
        self.rulers.get(&RulerId::new(id)).copied()
    }

    pub fn pending_echoes(&self) -> usize {
        self.pending.len()
    }

    /// Deliver queued notifications, returning how many were sent.
    pub fn flush_echoes(&mut self) -> usize {
        let Some(controller) = self.controller.clone() else {
            return 0;
        };
        let events: Vec<SliceEvent> = self.pending.drain(..).collect();
        let count = events.len();
        for event in events {
            let outcome = controller.handle(self, event);
            self.echo_outcomes.push(outcome);
        }
        count
    }

    /// Clear recorded writes, keeping the scene.
    pub fn reset_records(&mut self) {
        self.ruler_writes.clear();
        self.reslices.clear();
        self.published.clear();
        self.echo_outcomes.clear();
    }

    fn notify(&mut self, event: SliceEvent) {
        match self.echo_mode {
            EchoMode::Silent => {}
            EchoMode::Deferred => self.pending.push(event),
            EchoMode::Immediate => {
                if let Some(controller) = self.controller.clone() {
                    let outcome = controller.handle(self, event);
                    self.echo_outcomes.push(outcome);
                }
            }
        }
    }
}

impl Default for SpyHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SliceHost for SpyHost {
    fn volume(&self, id: &VolumeId) -> Option<&Volume> {
        self.volumes.get(id)
    }

    fn ruler_endpoints(&self, id: &RulerId) -> Option<[[f64; 3]; 2]> {
        self.rulers.get(id).copied()
    }

    fn write_ruler_endpoints(&mut self, id: &RulerId, endpoints: [[f64; 3]; 2]) -> Result<()> {
        if let Some(message) = &self.reject_writes {
            return Err(SliceError::Host(message.clone()));
        }
        if !self.rulers.contains_key(id) {
            return Err(SliceError::MissingCollaborator(format!("ruler {}", id)));
        }
        self.rulers.insert(id.clone(), endpoints);
        self.ruler_writes.push((id.clone(), endpoints));
        self.notify(SliceEvent::RulerEndpointsChanged);
        Ok(())
    }

    fn request_reslice(&mut self, volume: &VolumeId, transform: &Matrix4<f64>) {
        self.reslices.push((volume.clone(), *transform));
    }

    fn publish_parameters(&mut self, params: &SliceParameters) {
        self.published.push(params.clone());
        self.notify(SliceEvent::AngleOrShiftChanged(params.pose));
    }
}
