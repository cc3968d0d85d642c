// src/device/allocator.rs

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::device::DeviceInfo;
use crate::task::{ResourceSpec, TaskName};

#[derive(Debug, Clone, Copy)]
struct DeviceSlot {
    capacity: u64,
    reserved: u64,
}

impl DeviceSlot {
    fn free(&self) -> u64 {
        self.capacity - self.reserved
    }
}

#[derive(Debug, Clone)]
struct Reservation {
    devices: Vec<u32>,
    memory_per_device: u64,
}

/// Tracks device capacity and grants all-or-nothing reservations.
///
/// The allocator is only touched from the scheduler core, which runs on a
/// single serialized loop, so it carries no locking of its own.
///
/// Invariants:
/// - `reserved <= capacity` for every device
/// - a reservation covers its whole device set or does not exist
/// - each task holds at most one reservation
#[derive(Debug, Clone)]
pub struct DeviceAllocator {
    devices: BTreeMap<u32, DeviceSlot>,
    reservations: HashMap<TaskName, Reservation>,
}

impl DeviceAllocator {
    pub fn new(devices: &[DeviceInfo]) -> Self {
        let devices = devices
            .iter()
            .map(|d| {
                (
                    d.id,
                    DeviceSlot {
                        capacity: d.memory,
                        reserved: 0,
                    },
                )
            })
            .collect();

        Self {
            devices,
            reservations: HashMap::new(),
        }
    }

    /// All configured device IDs, ascending.
    pub fn device_ids(&self) -> Vec<u32> {
        self.devices.keys().copied().collect()
    }

    pub fn capacity(&self, device: u32) -> Option<u64> {
        self.devices.get(&device).map(|d| d.capacity)
    }

    pub fn reserved(&self, device: u32) -> Option<u64> {
        self.devices.get(&device).map(|d| d.reserved)
    }

    pub fn free(&self, device: u32) -> Option<u64> {
        self.devices.get(&device).map(DeviceSlot::free)
    }

    /// Whether `task` currently holds a reservation.
    pub fn holds(&self, task: &str) -> bool {
        self.reservations.contains_key(task)
    }

    /// Devices reserved by `task`, if any.
    pub fn devices_of(&self, task: &str) -> Option<&[u32]> {
        self.reservations.get(task).map(|r| r.devices.as_slice())
    }

    /// Resolve a spec's `visible_devices` (`None` = all devices).
    pub fn visible_devices(&self, spec: &ResourceSpec) -> Vec<u32> {
        match &spec.visible_devices {
            Some(ids) => ids.clone(),
            None => self.device_ids(),
        }
    }

    /// Whether `spec` could ever be satisfied on an otherwise idle machine.
    ///
    /// Returns the reason when it cannot; such requests exceed the total
    /// theoretical capacity and must not be retried forever.
    pub fn check_feasible(&self, spec: &ResourceSpec) -> Result<(), String> {
        let visible = self.visible_devices(spec);
        let fitting = visible
            .iter()
            .filter_map(|id| self.devices.get(id))
            .filter(|d| d.capacity >= spec.requires_memory_per_device)
            .count();

        if fitting < spec.min_devices as usize {
            return Err(format!(
                "needs {} device(s) with {} MiB each among {:?}, but only {} such device(s) exist",
                spec.min_devices, spec.requires_memory_per_device, visible, fitting
            ));
        }
        Ok(())
    }

    /// Convenience wrapper over [`try_reserve`](Self::try_reserve) for a spec.
    pub fn try_reserve_for(&mut self, task: &str, spec: &ResourceSpec) -> Option<Vec<u32>> {
        let visible = self.visible_devices(spec);
        self.try_reserve(
            task,
            &visible,
            spec.requires_memory_per_device,
            spec.min_devices,
        )
    }

    /// Reserve `memory_per_device` on `min_devices` devices out of
    /// `device_ids`, or nothing at all.
    ///
    /// Devices are chosen tightest fit first: among the devices whose free
    /// memory covers the request, those with the least free memory win, ties
    /// going to the lowest ID. This keeps large free blocks available for
    /// bigger requests.
    pub fn try_reserve(
        &mut self,
        task: &str,
        device_ids: &[u32],
        memory_per_device: u64,
        min_devices: u32,
    ) -> Option<Vec<u32>> {
        if let Some(existing) = self.reservations.get(task) {
            warn!(task = %task, devices = ?existing.devices, "task already holds a reservation");
            return Some(existing.devices.clone());
        }

        let mut candidates: Vec<(u64, u32)> = device_ids
            .iter()
            .filter_map(|id| self.devices.get(id).map(|slot| (slot.free(), *id)))
            .filter(|(free, _)| *free >= memory_per_device)
            .collect();
        candidates.sort_unstable();
        candidates.dedup_by_key(|(_, id)| *id);

        let wanted = min_devices.max(1) as usize;
        if candidates.len() < wanted {
            return None;
        }

        let mut chosen: Vec<u32> = candidates
            .into_iter()
            .take(wanted)
            .map(|(_, id)| id)
            .collect();
        chosen.sort_unstable();

        for id in &chosen {
            if let Some(slot) = self.devices.get_mut(id) {
                slot.reserved += memory_per_device;
            }
        }

        debug!(
            task = %task,
            devices = ?chosen,
            memory_per_device,
            "reserved devices"
        );

        self.reservations.insert(
            task.to_string(),
            Reservation {
                devices: chosen.clone(),
                memory_per_device,
            },
        );

        Some(chosen)
    }

    /// Return `task`'s reservation. Releasing twice is a no-op.
    ///
    /// Returns `true` if a reservation was actually released.
    pub fn release(&mut self, task: &str) -> bool {
        let Some(reservation) = self.reservations.remove(task) else {
            return false;
        };

        for id in &reservation.devices {
            if let Some(slot) = self.devices.get_mut(id) {
                slot.reserved = slot.reserved.saturating_sub(reservation.memory_per_device);
            }
        }

        debug!(task = %task, devices = ?reservation.devices, "released devices");
        true
    }
}
