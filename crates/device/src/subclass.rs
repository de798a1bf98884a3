//! Inserting and removing stages in front of an existing device.
//!
//! Callers hold the head of a chain by `&mut Device` and never see it move:
//! `install` swaps the wrapper into the caller's storage and pushes the old
//! device one level down, `uninstall` pulls it back up. The head keeps its
//! `DeviceId` and parent link either way.

use crate::device::{Device, DeviceId, PrivateData, Prototype};
use crate::error::DeviceResult;
use crate::memory::Arena;
use crate::op::{Op, OpTable, ProcSlot, fill_in_procs};
use log::{debug, trace};
use std::sync::Arc;

/// Wraps `target` in a new stage built from `prototype`.
///
/// Allocation happens before anything is touched: if either the node or the
/// `private_data_size`-byte private block cannot be had, whatever was
/// allocated is released and `target` is left exactly as it was.
pub fn install(target: &mut Device, prototype: &Prototype, private_data_size: usize) -> DeviceResult<()> {
    let memory = Arc::clone(target.memory());
    let node = memory.alloc(Arena::Collected, std::mem::size_of::<Device>(), "subclass device node")?;
    let private = match memory.alloc(Arena::Stable, private_data_size, "subclass private data") {
        Ok(allocation) => allocation,
        Err(err) => {
            memory.free(node);
            return Err(err);
        }
    };

    let wrapper = Device {
        id: target.id,
        name: prototype.name().to_string(),
        witness: prototype.witness(),
        procs: Arc::clone(prototype.procs()),
        declared: prototype.table().clone(),
        table: OpTable::unset(),
        state: target.state.clone(),
        is_open: target.is_open,
        private: Some(PrivateData {
            allocation: private,
            data: prototype.new_private_data(),
        }),
        parent: target.parent,
        child: None,
        finalize: prototype.finalize_hook(),
        memory,
        node_allocation: target.node_allocation.take(),
    };

    let mut child = std::mem::replace(target, wrapper);
    child.id = DeviceId::next();
    child.parent = Some(target.id);
    child.node_allocation = Some(node);
    fill_in_procs(&mut child.table);

    // Slots the child still has to wire stay unset on the wrapper too.
    for op in Op::ALL {
        let slot = if child.table.is_unset(op) {
            ProcSlot::Unset
        } else if target.declared.is_implemented(op) {
            ProcSlot::Implemented
        } else {
            ProcSlot::Default
        };
        target.table.set(op, slot);
    }

    if let Some(grandchild) = child.child.as_deref_mut() {
        grandchild.parent = Some(child.id);
    }
    debug!(
        "installed '{}' ({}) over '{}' ({}), now {}",
        target.name,
        target.witness.short_name(),
        child.name,
        child.witness.short_name(),
        child.id
    );
    target.child = Some(Box::new(child));
    Ok(())
}

/// Removes the stage at `dev`, moving its child back into `dev`'s storage.
/// A device with no child is left alone.
pub fn uninstall(dev: &mut Device) -> DeviceResult<()> {
    let Some(mut child) = dev.child.take() else {
        return Ok(());
    };
    let private = dev.private.take();
    let child_node = child.node_allocation.take();
    child.id = dev.id;
    child.parent = dev.parent;
    child.node_allocation = dev.node_allocation.take();
    if let Some(grandchild) = child.child.as_deref_mut() {
        grandchild.parent = Some(dev.id);
    }

    let mut shell = std::mem::replace(dev, *child);
    shell.finalize = None;
    debug!(
        "uninstalled '{}' ({}), '{}' ({}) is back at {}",
        shell.name,
        shell.witness.short_name(),
        dev.name,
        dev.witness.short_name(),
        dev.id
    );
    let memory = Arc::clone(&shell.memory);
    drop(shell);
    if let Some(private) = private {
        memory.free(private.allocation);
    }
    if let Some(node) = child_node {
        memory.free(node);
    }
    Ok(())
}

/// Copies the mirrored state from the child and follows the child's
/// deferred slots: wired once the child wires them, unset again once the
/// child releases them. No child: nothing to do.
pub fn resync(dev: &mut Device) -> DeviceResult<()> {
    let Device { state, child, table, declared, name, .. } = dev;
    let Some(child) = child.as_deref() else {
        return Ok(());
    };
    state.sync_from(&child.state);
    for op in Op::ALL {
        if table.is_unset(op) && !child.table.is_unset(op) {
            let slot = if declared.is_implemented(op) { ProcSlot::Implemented } else { ProcSlot::Default };
            table.set(op, slot);
            debug!("'{name}' wired {op} after its child did");
        } else if op.is_deferred() && !table.is_unset(op) && child.table.is_unset(op) {
            table.set(op, ProcSlot::Unset);
            debug!("'{name}' unwired {op} after its child did");
        }
    }
    trace!("'{name}' resynced from '{}'", child.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::memory::{BoundedMemory, DeviceMemory, HeapMemory};
    use crate::procs::DeviceProcs;

    #[derive(Debug)]
    struct Terminal;

    impl DeviceProcs for Terminal {}

    #[derive(Debug)]
    struct Stage;

    impl DeviceProcs for Stage {}

    fn terminal(memory: Arc<dyn DeviceMemory>) -> Device {
        let prototype = Prototype::new("terminal", Terminal, OpTable::implementing(&[Op::FillRectangle]));
        Device::new(&prototype, DeviceState::default(), memory).unwrap()
    }

    fn stage() -> Prototype {
        Prototype::new("stage", Stage, OpTable::all_implemented()).with_private_data(|| 0u64)
    }

    #[test]
    fn install_keeps_identity_and_links_the_child() {
        let mut dev = terminal(Arc::new(HeapMemory::new()));
        let head_id = dev.id();
        let proto = stage();
        install(&mut dev, &proto, proto.private_size()).unwrap();
        assert_eq!(dev.id(), head_id);
        assert!(dev.witness().is::<Stage>());
        let child = dev.child().unwrap();
        assert_ne!(child.id(), head_id);
        assert_eq!(child.parent(), Some(head_id));
        assert!(child.witness().is::<Terminal>());
        assert_eq!(dev.describe_chain(), "stage(Stage) -> terminal(Terminal)");
    }

    #[test]
    fn grandchild_follows_its_parent_down() {
        let mut dev = terminal(Arc::new(HeapMemory::new()));
        let proto = stage();
        install(&mut dev, &proto, 8).unwrap();
        let middle = dev.child().unwrap().id();
        install(&mut dev, &proto, 8).unwrap();
        let new_middle = dev.child().unwrap();
        assert_eq!(new_middle.child().unwrap().parent(), Some(new_middle.id()));
        assert_eq!(new_middle.child().unwrap().id(), middle);
        assert_eq!(dev.chain_len(), 3);
    }

    #[test]
    fn uninstall_restores_everything_and_frees_the_stage() {
        let memory = Arc::new(HeapMemory::new());
        let mut dev = terminal(memory.clone());
        let before_table = dev.table().clone();
        let before_state = dev.state().clone();
        let (stable, collected) = (memory.in_use(Arena::Stable), memory.in_use(Arena::Collected));
        let proto = stage();
        install(&mut dev, &proto, 64).unwrap();
        assert_eq!(memory.in_use(Arena::Stable), stable + 64);
        uninstall(&mut dev).unwrap();
        assert_eq!(dev.table(), &before_table);
        assert_eq!(dev.state(), &before_state);
        assert_eq!(dev.parent(), None);
        assert!(dev.witness().is::<Terminal>());
        assert_eq!(memory.in_use(Arena::Stable), stable);
        assert_eq!(memory.in_use(Arena::Collected), collected);
    }

    #[test]
    fn uninstall_without_child_is_a_no_op() {
        let mut dev = terminal(Arc::new(HeapMemory::new()));
        assert!(uninstall(&mut dev).is_ok());
        assert!(resync(&mut dev).is_ok());
        assert_eq!(dev.chain_len(), 1);
    }

    #[test]
    fn failed_private_allocation_rolls_back() {
        let memory = Arc::new(BoundedMemory::new(std::mem::size_of::<Device>()));
        let mut dev = terminal(memory.clone());
        let id = dev.id();
        let proto = stage();
        assert!(install(&mut dev, &proto, 1).is_err());
        assert_eq!(memory.in_use(Arena::Collected), 0);
        assert_eq!(dev.id(), id);
        assert!(dev.child().is_none());
        assert!(dev.witness().is::<Terminal>());
    }

    #[test]
    fn deferred_slot_stays_unset_until_the_child_wires_it() {
        let mut dev = terminal(Arc::new(HeapMemory::new()));
        let proto = stage();
        install(&mut dev, &proto, 8).unwrap();
        assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Unset);
        assert_eq!(dev.table().get(Op::FillPath), ProcSlot::Implemented);
        dev.child_mut().unwrap().wire_deferred();
        resync(&mut dev).unwrap();
        assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Implemented);
        dev.child_mut().unwrap().unwire_deferred();
        resync(&mut dev).unwrap();
        assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Unset);
    }

    #[test]
    fn resync_is_idempotent() {
        let mut dev = terminal(Arc::new(HeapMemory::new()));
        let proto = stage();
        install(&mut dev, &proto, 8).unwrap();
        dev.child_mut().unwrap().state_mut().hw_resolution = [300.0, 300.0];
        resync(&mut dev).unwrap();
        let once = (dev.state().clone(), dev.table().clone());
        resync(&mut dev).unwrap();
        assert_eq!((dev.state().clone(), dev.table().clone()), once);
        assert_eq!(dev.state().hw_resolution, [300.0, 300.0]);
    }
}
