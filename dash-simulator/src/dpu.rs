//! In-process stand-in for the DPU's SAI command interface.
//!
//! Objects are tracked by command name. A `create` returns a fresh non-zero
//! object id, or `0` when the name already exists, the command is a
//! malformed ACL rule, or the fault plan refuses it. A `remove` returns `0`,
//! or `-1` (`SAI_STATUS_FAILURE`) when the object does not exist or the fault
//! plan refuses it.
//!
//! Forwarding is decided per frame from the objects currently configured:
//! the VNI must belong to a configured VNET (when any exist), and the first
//! ACL rule by ascending priority that matches the inner addresses decides.
//! Frames matching no rule are dropped.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use dash_config::SimulatorConfig;
use dash_core::{Command, CommandStatus, Device, DeviceError, Operation};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::acl::{vnet_vni, AclAction, AclRule, ACL_RULE_TYPE};
use crate::chaos::FaultPlan;

const SAI_STATUS_FAILURE: i64 = -1;
const FIRST_OID: i64 = 0x2100_0000_0000_0001;

#[derive(Debug, Clone)]
pub struct SimObject {
    pub oid: i64,
    pub command: Command,
}

/// Inner header fields the forwarding decision looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView {
    pub vni: u32,
    pub inner_src: Ipv4Addr,
    pub inner_dst: Ipv4Addr,
}

#[derive(Debug)]
pub struct DpuState {
    objects: BTreeMap<String, SimObject>,
    next_oid: i64,
    faults: FaultPlan,
    log: Vec<Command>,
}

impl DpuState {
    fn new(faults: FaultPlan) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_oid: FIRST_OID,
            faults,
            log: Vec::new(),
        }
    }

    fn process(&mut self, command: &Command) -> CommandStatus {
        self.log.push(command.clone());
        let refused = self.faults.rejects(&command.name, command.op);
        match command.op {
            Operation::Create => {
                let malformed = command.object_type.as_deref() == Some(ACL_RULE_TYPE)
                    && AclRule::from_command(command).is_none();
                if refused || malformed || self.objects.contains_key(&command.name) {
                    return CommandStatus(0);
                }
                let oid = self.next_oid;
                self.next_oid += 1;
                self.objects.insert(
                    command.name.clone(),
                    SimObject {
                        oid,
                        command: command.clone(),
                    },
                );
                CommandStatus(oid)
            }
            Operation::Remove => {
                if refused || self.objects.remove(&command.name).is_none() {
                    CommandStatus(SAI_STATUS_FAILURE)
                } else {
                    CommandStatus(0)
                }
            }
        }
    }

    /// Whether the DPU forwards `frame` with its current configuration.
    pub fn forwards(&self, frame: &FrameView) -> bool {
        self.snapshot().forwards(frame)
    }

    /// Compiles the current configuration into a decision function that no
    /// longer borrows the state.
    pub fn snapshot(&self) -> ForwardingSnapshot {
        let vnis = self
            .objects
            .values()
            .filter_map(|o| vnet_vni(&o.command))
            .collect();
        let mut rules: Vec<AclRule> = self
            .objects
            .values()
            .filter_map(|o| AclRule::from_command(&o.command))
            .collect();
        rules.sort_by_key(|r| r.priority);
        ForwardingSnapshot { vnis, rules }
    }
}

/// Forwarding rules frozen at the moment traffic starts.
#[derive(Debug, Clone)]
pub struct ForwardingSnapshot {
    vnis: Vec<u32>,
    rules: Vec<AclRule>,
}

impl ForwardingSnapshot {
    pub fn forwards(&self, frame: &FrameView) -> bool {
        if !self.vnis.is_empty() && !self.vnis.contains(&frame.vni) {
            return false;
        }
        self.rules
            .iter()
            .find(|r| r.matches(frame.inner_src, frame.inner_dst))
            .map(|r| r.action == AclAction::Permit)
            .unwrap_or(false)
    }
}

/// Simulated DPU. Clones share state.
#[derive(Debug, Clone)]
pub struct SimulatedDpu {
    state: Arc<Mutex<DpuState>>,
}

impl SimulatedDpu {
    pub fn new() -> Self {
        Self::with_faults(FaultPlan::default())
    }

    pub fn with_faults(faults: FaultPlan) -> Self {
        Self {
            state: Arc::new(Mutex::new(DpuState::new(faults))),
        }
    }

    /// Builds a DPU refusing the commands listed in `config.reject_commands`.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let faults = config
            .reject_commands
            .iter()
            .fold(FaultPlan::new(), |plan, name| plan.reject(name.as_str()));
        Self::with_faults(faults)
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        self.state.lock().faults = faults;
    }

    /// Every command received so far, in arrival order.
    pub fn command_log(&self) -> Vec<Command> {
        self.state.lock().log.clone()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.state.lock().objects.contains_key(name)
    }

    pub(crate) fn shared_state(&self) -> Arc<Mutex<DpuState>> {
        Arc::clone(&self.state)
    }
}

impl Default for SimulatedDpu {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Device for SimulatedDpu {
    async fn process_commands(
        &self,
        commands: &[Command],
    ) -> Result<Vec<CommandStatus>, DeviceError> {
        let mut state = self.state.lock();
        if state.faults.is_unreachable() {
            return Err(DeviceError::Unreachable("simulated DPU is offline".into()));
        }
        debug!(commands = commands.len(), "Simulated DPU processing commands");
        let statuses = commands
            .iter()
            .map(|c| {
                let status = state.process(c);
                trace!(name = %c.name, op = %c.op, status = status.0, "Processed command");
                status
            })
            .collect();
        Ok(statuses)
    }
}
