//! Wavelength occupancy for lightpath-routed networks.
//!
//! A lightpath keeps one wavelength on every link of a transparent segment.
//! Where the accumulated length would exceed the optical reach, a regenerator
//! at the intermediate node starts a new transparent segment, which may use a
//! different wavelength.

use resilience_types::{LinkId, NetworkState, NodeId, StateError};

/// Link attribute overriding the number of wavelengths of a link.
pub const WAVELENGTHS_ATTRIBUTE: &str = "wavelengths";

/// Wavelengths and regenerators assigned to one lightpath.
#[derive(Debug, Clone, PartialEq)]
pub struct LightpathAssignment {
    pub links: Vec<LinkId>,
    /// Wavelength index per link, parallel to `links`.
    pub wavelengths: Vec<u32>,
    /// Nodes where the signal is regenerated.
    pub regenerators: Vec<NodeId>,
}

impl LightpathAssignment {
    pub fn num_regenerators(&self) -> usize {
        self.regenerators.len()
    }
}

/// Journal position of a [`WavelengthTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCheckpoint(usize);

/// Occupancy of every wavelength slot of every link.
///
/// Same transaction discipline as the capacity ledger: writes are journaled
/// and can be rolled back to a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthTable {
    occupied: Vec<Vec<bool>>,
    journal: Vec<(usize, usize, bool)>,
    /// Set when a write hit an already occupied slot (or released a free one).
    conflicts: usize,
}

impl WavelengthTable {
    /// An empty table. Each link gets its `wavelengths` attribute, or
    /// `default_wavelengths` when unset.
    pub fn new(state: &NetworkState, default_wavelengths: u32) -> Self {
        let occupied = state
            .links()
            .map(|link| {
                let count = link
                    .attribute_u32(WAVELENGTHS_ATTRIBUTE)
                    .unwrap_or(default_wavelengths);
                vec![false; count as usize]
            })
            .collect();
        Self {
            occupied,
            journal: Vec::new(),
            conflicts: 0,
        }
    }

    pub fn num_wavelengths(&self, link: LinkId) -> usize {
        self.occupied.get(link.index()).map_or(0, Vec::len)
    }

    pub fn is_free(&self, link: LinkId, wavelength: u32) -> bool {
        self.occupied
            .get(link.index())
            .and_then(|slots| slots.get(wavelength as usize))
            .is_some_and(|taken| !taken)
    }

    /// Number of occupied slots across all links.
    pub fn occupied_slots(&self) -> usize {
        self.occupied
            .iter()
            .map(|slots| slots.iter().filter(|taken| **taken).count())
            .sum()
    }

    fn write(&mut self, link: LinkId, wavelength: u32, taken: bool) -> Result<(), StateError> {
        let slot = self
            .occupied
            .get_mut(link.index())
            .and_then(|slots| slots.get_mut(wavelength as usize))
            .ok_or(StateError::UnknownLink(link))?;
        let previous = *slot;
        if previous == taken {
            self.conflicts += 1;
        }
        *slot = taken;
        self.journal.push((link.index(), wavelength as usize, previous));
        Ok(())
    }

    /// Take the slots of a lightpath.
    pub fn occupy(&mut self, assignment: &LightpathAssignment) -> Result<(), StateError> {
        for (&link, &wavelength) in assignment.links.iter().zip(&assignment.wavelengths) {
            self.write(link, wavelength, true)?;
        }
        Ok(())
    }

    /// Free the slots of a lightpath.
    pub fn release(&mut self, assignment: &LightpathAssignment) -> Result<(), StateError> {
        for (&link, &wavelength) in assignment.links.iter().zip(&assignment.wavelengths) {
            self.write(link, wavelength, false)?;
        }
        Ok(())
    }

    pub fn checkpoint(&self) -> TableCheckpoint {
        TableCheckpoint(self.journal.len())
    }

    /// Whether a write since the last top-level commit conflicted.
    pub fn has_conflicts(&self) -> bool {
        self.conflicts > 0
    }

    pub fn rollback(&mut self, checkpoint: TableCheckpoint) {
        while self.journal.len() > checkpoint.0 {
            let Some((link, wavelength, previous)) = self.journal.pop() else {
                break;
            };
            self.occupied[link][wavelength] = previous;
        }
        if checkpoint.0 == 0 {
            self.conflicts = 0;
        }
    }

    pub fn commit(&mut self, checkpoint: TableCheckpoint) {
        if checkpoint.0 == 0 {
            self.journal.clear();
            self.conflicts = 0;
        }
    }

    /// First-fit assignment along `links`.
    ///
    /// Regenerators are placed greedily, as late as the reach allows. Returns
    /// `None` when a single link exceeds `max_reach_km` or a transparent
    /// segment has no wavelength free on all of its links.
    pub fn first_fit(
        &self,
        state: &NetworkState,
        links: &[LinkId],
        max_reach_km: f64,
    ) -> Result<Option<LightpathAssignment>, StateError> {
        let mut segments: Vec<Vec<LinkId>> = Vec::new();
        let mut regenerators = Vec::new();
        let mut current: Vec<LinkId> = Vec::new();
        let mut reach = 0.0;

        for &link_id in links {
            let link = state.link(link_id)?;
            if link.length_km > max_reach_km {
                return Ok(None);
            }
            if !current.is_empty() && reach + link.length_km > max_reach_km {
                regenerators.push(link.origin);
                segments.push(std::mem::take(&mut current));
                reach = 0.0;
            }
            reach += link.length_km;
            current.push(link_id);
        }
        if !current.is_empty() {
            segments.push(current);
        }

        let mut wavelengths = Vec::with_capacity(links.len());
        for segment in &segments {
            let slots = segment
                .iter()
                .map(|l| self.num_wavelengths(*l))
                .min()
                .unwrap_or(0);
            let Some(wavelength) = (0..slots as u32)
                .find(|&w| segment.iter().all(|l| self.is_free(*l, w)))
            else {
                return Ok(None);
            };
            wavelengths.extend(std::iter::repeat(wavelength).take(segment.len()));
        }

        Ok(Some(LightpathAssignment {
            links: links.to_vec(),
            wavelengths,
            regenerators,
        }))
    }
}
