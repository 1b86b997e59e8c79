//! Maps live displays to notch surfaces.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::config::Preferences;
use crate::display::{BindingId, Display, DisplayName, Topology};
use crate::geometry::{Rect, notch_placement};
use crate::notch::{Phase, SurfaceStateMachine};
use crate::timer::{OverlayTimer, TimerRequest, TimerSlot, TimerToken};

/// One display's notch: its surface state and the timers it owns.
#[derive(Debug)]
pub struct DisplayBinding {
    id: BindingId,
    display: Display,
    placement: Rect,
    surface: SurfaceStateMachine,
    /// Hover-to-open and leave-to-close intent.
    pointer: OverlayTimer,
}

impl DisplayBinding {
    fn new(id: BindingId, display: Display) -> Self {
        let placement = notch_placement(&display.frame);
        Self {
            id,
            display,
            placement,
            surface: SurfaceStateMachine::new(id),
            pointer: OverlayTimer::new(TimerSlot::Pointer(id)),
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn placement(&self) -> Rect {
        self.placement
    }

    pub fn surface(&self) -> &SurfaceStateMachine {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut SurfaceStateMachine {
        &mut self.surface
    }

    pub fn arm_pointer(&mut self, after: Duration) -> TimerRequest {
        self.pointer.start(after)
    }

    pub fn cancel_pointer(&mut self) -> bool {
        self.pointer.cancel()
    }

    pub fn fire_pointer(&mut self, token: TimerToken) -> bool {
        self.pointer.fire(token)
    }

    /// Snap to `Closed` and drop any pending pointer intent.
    fn force_closed(&mut self) {
        self.pointer.cancel();
        self.surface.force_reset(Phase::Closed);
    }

    pub fn teardown(&mut self) {
        self.pointer.cancel();
        self.surface.teardown();
    }
}

/// Surface resource changes the host has to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceChange {
    Create {
        binding: BindingId,
        display: DisplayName,
        placement: Rect,
    },
    Destroy {
        binding: BindingId,
    },
    Move {
        binding: BindingId,
        display: DisplayName,
        placement: Rect,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcileReport {
    pub changes: Vec<SurfaceChange>,
    /// The effective selected display changed.
    pub selection_changed: Option<DisplayName>,
    /// The preferred display vanished; this fallback should be persisted.
    pub persist_selection: Option<DisplayName>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty() && self.selection_changed.is_none()
    }
}

#[derive(Debug, Default)]
pub struct DisplayReconciler {
    bindings: BTreeMap<DisplayName, DisplayBinding>,
    next_id: u64,
    topology: Topology,
    selected: Option<DisplayName>,
}

impl DisplayReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Display the process-wide overlay is projected onto.
    pub fn selected(&self) -> Option<&DisplayName> {
        self.selected.as_ref()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &DisplayBinding> {
        self.bindings.values()
    }

    pub fn binding(&self, id: BindingId) -> Option<&DisplayBinding> {
        self.bindings.values().find(|b| b.id == id)
    }

    pub fn binding_mut(&mut self, id: BindingId) -> Option<&mut DisplayBinding> {
        self.bindings.values_mut().find(|b| b.id == id)
    }

    pub fn binding_for(&self, name: &DisplayName) -> Option<&DisplayBinding> {
        self.bindings.get(name)
    }

    pub fn binding_for_mut(&mut self, name: &DisplayName) -> Option<&mut DisplayBinding> {
        self.bindings.get_mut(name)
    }

    /// The binding on the selected display, falling back to any binding.
    pub fn selected_binding_mut(&mut self) -> Option<&mut DisplayBinding> {
        let name = match &self.selected {
            Some(name) if self.bindings.contains_key(name) => name.clone(),
            _ => self.bindings.keys().next()?.clone(),
        };
        self.bindings.get_mut(&name)
    }

    fn allocate_id(&mut self) -> BindingId {
        self.next_id += 1;
        BindingId::new(self.next_id)
    }

    /// Work out which display is selected and whether a vanished preference
    /// forced a fallback.
    fn resolve_selection(topology: &Topology, prefs: &Preferences) -> (Option<DisplayName>, bool) {
        let primary = topology.primary_display().map(|d| d.name.clone());
        match prefs.selected_display.as_deref() {
            Some(wanted) => {
                let wanted = DisplayName::new(wanted);
                if topology.get(&wanted).is_some() {
                    (Some(wanted), false)
                } else {
                    let fell_back = primary.is_some();
                    (primary, fell_back)
                }
            }
            None => (primary, false),
        }
    }

    /// Diff `topology` against the known bindings and apply it.
    pub fn reconcile(&mut self, topology: Topology, prefs: &Preferences) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let all_displays = prefs.show_on_all_displays;
        let (selected, fell_back) = Self::resolve_selection(&topology, prefs);

        let desired: BTreeSet<DisplayName> = if all_displays {
            topology.displays.iter().map(|d| d.name.clone()).collect()
        } else {
            selected.iter().cloned().collect()
        };
        let known: BTreeSet<DisplayName> = self.bindings.keys().cloned().collect();

        for name in known.difference(&desired) {
            if let Some(mut binding) = self.bindings.remove(name) {
                binding.teardown();
                tracing::info!("display {name} gone: tearing down binding {}", binding.id);
                report.changes.push(SurfaceChange::Destroy {
                    binding: binding.id,
                });
            }
        }

        for name in desired.intersection(&known) {
            let (Some(binding), Some(live)) = (self.bindings.get_mut(name), topology.get(name))
            else {
                continue;
            };
            if binding.display.frame != live.frame {
                binding.display = live.clone();
                binding.placement = notch_placement(&live.frame);
                report.changes.push(SurfaceChange::Move {
                    binding: binding.id,
                    display: name.clone(),
                    placement: binding.placement,
                });
            }
        }

        for name in desired.difference(&known) {
            let Some(live) = topology.get(name) else {
                continue;
            };
            let id = self.allocate_id();
            let binding = DisplayBinding::new(id, live.clone());
            tracing::info!("display {name} attached: binding {id}");
            report.changes.push(SurfaceChange::Create {
                binding: id,
                display: name.clone(),
                placement: binding.placement,
            });
            self.bindings.insert(name.clone(), binding);
        }

        if !report.changes.is_empty() {
            for binding in self.bindings.values_mut() {
                binding.force_closed();
            }
        }

        if selected != self.selected {
            if let Some(name) = &selected {
                tracing::info!("selected display -> {name}");
                report.selection_changed = Some(name.clone());
            }
            self.selected = selected.clone();
        }
        if fell_back && !all_displays {
            report.persist_selection = selected;
        }

        self.topology = topology;
        report
    }

    /// Tear down every binding. Returns the ids whose surfaces must be
    /// released; empty when called again.
    pub fn teardown(&mut self) -> Vec<BindingId> {
        let mut released = Vec::new();
        for (_, mut binding) in std::mem::take(&mut self.bindings) {
            binding.teardown();
            released.push(binding.id);
        }
        self.selected = None;
        released
    }
}
