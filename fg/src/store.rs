//! Storage of shared and per-frame functional groups.
//!
//! A [`GroupStore`] keeps every functional group type
//! in exactly one of three states (see [`GroupState`]):
//! unset, shared by all frames, or stored for each frame individually.
//! Inserting a per-frame group which differs from an existing shared group
//! of the same type demotes the shared group,
//! copying it to every known frame before the new group is stored.

use crate::group::FunctionalGroup;
use crate::types::{FrameIndex, GroupType};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, error, trace};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Group type {} is always per-frame and cannot be shared", group_type))]
    NotShareable {
        group_type: GroupType,
        backtrace: Backtrace,
    },

    #[snafu(display("Group type {} is always shared and cannot be per-frame", group_type))]
    NotPerFrame {
        group_type: GroupType,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Group type {} is stored per-frame, remove the per-frame groups before sharing it",
        group_type
    ))]
    StoredPerFrame {
        group_type: GroupType,
        backtrace: Backtrace,
    },

    #[snafu(display("No shared group of type {}", group_type))]
    NoSuchSharedGroup {
        group_type: GroupType,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Group type {} differs between frames {} and {}, cannot share it",
        group_type,
        first,
        other
    ))]
    PerFrameValuesDiffer {
        group_type: GroupType,
        first: FrameIndex,
        other: FrameIndex,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Group type {} is missing in frame {}, cannot share it",
        group_type,
        frame
    ))]
    MissingInFrame {
        group_type: GroupType,
        frame: FrameIndex,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Memory exhausted while distributing shared group {} to {} frames",
        group_type,
        frames
    ))]
    MemoryExhausted {
        group_type: GroupType,
        frames: usize,
        source: std::collections::TryReserveError,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The storage state of a functional group type in a [`GroupStore`].
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum GroupState {
    /// no group of this type is stored
    Unset,
    /// one group of this type applies to all frames
    Shared,
    /// groups of this type are stored for individual frames
    PerFrame,
}

/// The functional groups of a single frame,
/// or the functional groups shared by all frames,
/// holding at most one group per type.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FunctionalGroups {
    groups: BTreeMap<GroupType, FunctionalGroup>,
}

impl FunctionalGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the group of the given type.
    pub fn find(&self, group_type: GroupType) -> Option<&FunctionalGroup> {
        self.groups.get(&group_type)
    }

    /// Insert a group, returning the one it replaces.
    pub fn insert(&mut self, group: FunctionalGroup) -> Option<FunctionalGroup> {
        self.groups.insert(group.group_type(), group)
    }

    /// Remove the group of the given type.
    pub fn remove(&mut self, group_type: GroupType) -> Option<FunctionalGroup> {
        self.groups.remove(&group_type)
    }

    pub fn contains(&self, group_type: GroupType) -> bool {
        self.groups.contains_key(&group_type)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate over the groups in order of group type.
    pub fn iter(&self) -> btree_map::Values<'_, GroupType, FunctionalGroup> {
        self.groups.values()
    }

    /// The set of group types present.
    pub fn group_types(&self) -> BTreeSet<GroupType> {
        self.groups.keys().copied().collect()
    }
}

impl<'a> IntoIterator for &'a FunctionalGroups {
    type Item = &'a FunctionalGroup;
    type IntoIter = btree_map::Values<'a, GroupType, FunctionalGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A structural problem found by [`GroupStore::check`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Violation {
    /// a group type is both shared and stored for a frame
    SharedAndPerFrame {
        group_type: GroupType,
        frame: FrameIndex,
    },
    /// a per-frame only group type is stored as shared
    SharedButPerFrameOnly { group_type: GroupType },
    /// a shared only group type is stored for a frame
    PerFrameButSharedOnly {
        group_type: GroupType,
        frame: FrameIndex,
    },
    /// a frame does not carry the Frame Content group
    MissingFrameContent { frame: FrameIndex },
    /// a frame does not carry the same per-frame group types as the first frame
    InconsistentGroupTypes {
        frame: FrameIndex,
        missing: Vec<GroupType>,
        extra: Vec<GroupType>,
    },
    /// the frame indices are not 0..N-1
    NonDenseFrames {
        number_of_frames: usize,
        max_index: FrameIndex,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::SharedAndPerFrame { group_type, frame } => write!(
                f,
                "Functional group {} is shared AND per-frame for frame {}",
                group_type, frame
            ),
            Violation::SharedButPerFrameOnly { group_type } => write!(
                f,
                "Functional group {} used as shared functional group but must be per-frame",
                group_type
            ),
            Violation::PerFrameButSharedOnly { group_type, frame } => write!(
                f,
                "Functional group {} can never be per-frame, but found for frame {}",
                group_type, frame
            ),
            Violation::MissingFrameContent { frame } => {
                write!(f, "Frame Content functional group missing for frame {}", frame)
            }
            Violation::InconsistentGroupTypes {
                frame,
                missing,
                extra,
            } => write!(
                f,
                "Frame {} groups differ from the first frame (missing: {:?}, extra: {:?})",
                frame, missing, extra
            ),
            Violation::NonDenseFrames {
                number_of_frames,
                max_index,
            } => write!(
                f,
                "{} frames are stored but the highest frame index is {}",
                number_of_frames, max_index
            ),
        }
    }
}

/// Owner of the shared and per-frame functional groups
/// of a multi-frame object.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GroupStore {
    shared: FunctionalGroups,
    per_frame: BTreeMap<FrameIndex, FunctionalGroups>,
}

impl GroupStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all shared and per-frame groups.
    pub fn clear(&mut self) {
        self.shared = FunctionalGroups::new();
        self.per_frame.clear();
    }

    /// The number of frames with per-frame groups.
    ///
    /// This is derived from the stored groups,
    /// never from a _Number of Frames_ attribute.
    pub fn number_of_frames(&self) -> usize {
        self.per_frame.len()
    }

    /// Iterate over the indices of the frames with per-frame groups,
    /// in increasing order.
    pub fn frames(&self) -> impl Iterator<Item = FrameIndex> + '_ {
        self.per_frame.keys().copied()
    }

    /// Whether the frame indices form the range `0..number_of_frames()`.
    pub fn has_dense_frames(&self) -> bool {
        match self.per_frame.keys().next_back() {
            None => true,
            Some(&max) => max as usize + 1 == self.per_frame.len(),
        }
    }

    /// The shared functional groups.
    pub fn shared(&self) -> &FunctionalGroups {
        &self.shared
    }

    /// The per-frame functional groups of the given frame.
    pub fn per_frame(&self, frame: FrameIndex) -> Option<&FunctionalGroups> {
        self.per_frame.get(&frame)
    }

    /// The shared group of the given type.
    pub fn get_shared(&self, group_type: GroupType) -> Option<&FunctionalGroup> {
        self.shared.find(group_type)
    }

    /// The per-frame group of the given type for the given frame.
    pub fn get_per_frame(
        &self,
        frame: FrameIndex,
        group_type: GroupType,
    ) -> Option<&FunctionalGroup> {
        self.per_frame.get(&frame)?.find(group_type)
    }

    /// Get the group of the given type applying to a frame,
    /// whether it is stored per frame or shared.
    ///
    /// The second value of the pair is `true` if the group is per-frame.
    pub fn get(
        &self,
        frame: FrameIndex,
        group_type: GroupType,
    ) -> Option<(&FunctionalGroup, bool)> {
        if let Some(group) = self.get_per_frame(frame, group_type) {
            return Some((group, true));
        }
        self.shared.find(group_type).map(|group| (group, false))
    }

    /// The storage state of a group type.
    pub fn state(&self, group_type: GroupType) -> GroupState {
        if self.shared.contains(group_type) {
            GroupState::Shared
        } else if self.per_frame.values().any(|g| g.contains(group_type)) {
            GroupState::PerFrame
        } else {
            GroupState::Unset
        }
    }

    /// Insert or replace the shared group of the group's type.
    ///
    /// Groups of a type currently stored per frame are never shared implicitly:
    /// they must be removed first
    /// (or collapsed with [`convert_per_frame_to_shared`](Self::convert_per_frame_to_shared)).
    pub fn add_shared(&mut self, group: FunctionalGroup) -> Result<()> {
        let group_type = group.group_type();
        ensure!(
            group_type.shared_type().can_be_shared(),
            NotShareableSnafu { group_type }
        );
        ensure!(
            self.state(group_type) != GroupState::PerFrame,
            StoredPerFrameSnafu { group_type }
        );
        if self.shared.insert(group).is_some() {
            trace!("Replaced shared group {}", group_type);
        }
        Ok(())
    }

    /// Add a group for a single frame.
    ///
    /// - If a shared group of the same type holds the same values,
    ///   nothing changes and the shared group keeps applying to the frame.
    /// - If a shared group of the same type differs,
    ///   it is first copied to every known frame and removed from the shared groups.
    /// - The group is then stored for the frame,
    ///   replacing any previous group of that type.
    ///
    /// On error the store is left unchanged.
    pub fn add_per_frame(&mut self, frame: FrameIndex, group: FunctionalGroup) -> Result<()> {
        let group_type = group.group_type();
        ensure!(
            group_type.shared_type().can_be_per_frame(),
            NotPerFrameSnafu { group_type }
        );

        if let Some(shared) = self.shared.find(group_type) {
            if *shared == group {
                debug!(
                    "Re-using shared group instead of adding per-frame for frame {}, type {}",
                    frame, group_type
                );
                return Ok(());
            }
            debug!(
                "Converting shared group of type {} to per-frame, frame {} deviates",
                group_type, frame
            );
            self.demote(group_type, Some(frame))?;
        }

        self.insert_per_frame(frame, group);
        Ok(())
    }

    /// Distribute the shared group of the given type to all known frames.
    ///
    /// On error the store is left unchanged.
    pub fn convert_shared_to_per_frame(&mut self, group_type: GroupType) -> Result<()> {
        ensure!(
            self.shared.contains(group_type),
            NoSuchSharedGroupSnafu { group_type }
        );
        self.demote(group_type, None)
    }

    /// Collapse the per-frame groups of the given type into one shared group.
    ///
    /// This only succeeds if every frame carries a group of that type
    /// and all of them hold the same values.
    /// Returns `false` if no per-frame group of that type exists.
    pub fn convert_per_frame_to_shared(&mut self, group_type: GroupType) -> Result<bool> {
        ensure!(
            group_type.shared_type().can_be_shared(),
            NotShareableSnafu { group_type }
        );
        let mut frames = self.per_frame.iter();
        let (first_frame, first) = match frames.next() {
            Some((&frame, groups)) => match groups.find(group_type) {
                Some(group) => (frame, group),
                None if self.state(group_type) == GroupState::PerFrame => {
                    return MissingInFrameSnafu { group_type, frame }.fail()
                }
                None => return Ok(false),
            },
            None => return Ok(false),
        };
        for (&frame, groups) in frames {
            let group = groups
                .find(group_type)
                .context(MissingInFrameSnafu { group_type, frame })?;
            ensure!(
                group == first,
                PerFrameValuesDifferSnafu {
                    group_type,
                    first: first_frame,
                    other: frame,
                }
            );
        }
        let shared = first.clone();
        self.delete_per_frame_all(group_type);
        self.shared.insert(shared);
        debug!("Converted per-frame groups of type {} to shared", group_type);
        Ok(true)
    }

    /// Remove the shared group of the given type.
    /// Returns whether a group was removed.
    pub fn delete_shared(&mut self, group_type: GroupType) -> bool {
        self.shared.remove(group_type).is_some()
    }

    /// Remove the group of the given type from one frame.
    /// Returns whether a group was removed.
    ///
    /// A frame left without any group is no longer counted as a frame.
    pub fn delete_per_frame(&mut self, frame: FrameIndex, group_type: GroupType) -> bool {
        let (removed, now_empty) = match self.per_frame.get_mut(&frame) {
            Some(groups) => (groups.remove(group_type).is_some(), groups.is_empty()),
            None => return false,
        };
        if removed {
            debug!("Deleting group for frame {}, type: {}", frame, group_type);
        }
        if now_empty {
            self.per_frame.remove(&frame);
        }
        removed
    }

    /// Remove the group of the given type from all frames.
    /// Returns the number of groups removed.
    pub fn delete_per_frame_all(&mut self, group_type: GroupType) -> usize {
        let mut deleted = 0;
        for groups in self.per_frame.values_mut() {
            if groups.remove(group_type).is_some() {
                deleted += 1;
            }
        }
        self.per_frame.retain(|_, groups| !groups.is_empty());
        deleted
    }

    /// Remove all per-frame groups of a frame.
    /// Returns the number of groups removed.
    pub fn delete_frame(&mut self, frame: FrameIndex) -> usize {
        self.per_frame
            .remove(&frame)
            .map_or(0, |groups| groups.len())
    }

    /// Check the structure of the stored groups,
    /// returning every violation found.
    /// An empty list means the structure is valid.
    pub fn check(&self) -> Vec<Violation> {
        debug!(
            "Checking functional group structure for {} frames",
            self.per_frame.len()
        );
        let mut violations = Vec::new();

        for group in &self.shared {
            if !group.shared_type().can_be_shared() {
                violations.push(Violation::SharedButPerFrameOnly {
                    group_type: group.group_type(),
                });
            }
        }

        if !self.has_dense_frames() {
            if let Some(&max_index) = self.per_frame.keys().next_back() {
                violations.push(Violation::NonDenseFrames {
                    number_of_frames: self.per_frame.len(),
                    max_index,
                });
            }
        }

        let reference = self.per_frame.values().next().map(|g| g.group_types());
        for (&frame, groups) in &self.per_frame {
            trace!("Checking frame {}...", frame);
            for group in groups {
                let group_type = group.group_type();
                if self.shared.contains(group_type) {
                    violations.push(Violation::SharedAndPerFrame { group_type, frame });
                }
                if !group.shared_type().can_be_per_frame() {
                    violations.push(Violation::PerFrameButSharedOnly { group_type, frame });
                }
            }
            if !groups.contains(GroupType::FrameContent) {
                violations.push(Violation::MissingFrameContent { frame });
            }
            if let Some(reference) = &reference {
                let types = groups.group_types();
                if &types != reference {
                    violations.push(Violation::InconsistentGroupTypes {
                        frame,
                        missing: reference.difference(&types).copied().collect(),
                        extra: types.difference(reference).copied().collect(),
                    });
                }
            }
        }

        for violation in &violations {
            error!("{}", violation);
        }
        violations
    }

    /// Whether [`check`](Self::check) finds no violation.
    pub fn is_valid(&self) -> bool {
        self.check().is_empty()
    }

    /// Store a group for a frame as it was read,
    /// without reconciling it with a shared group of the same type.
    /// Such conflicts are left for [`check`](Self::check) to report.
    pub(crate) fn insert_per_frame_as_read(
        &mut self,
        frame: FrameIndex,
        group: FunctionalGroup,
    ) -> Result<()> {
        let group_type = group.group_type();
        ensure!(
            group_type.shared_type().can_be_per_frame(),
            NotPerFrameSnafu { group_type }
        );
        self.insert_per_frame(frame, group);
        Ok(())
    }

    fn insert_per_frame(&mut self, frame: FrameIndex, group: FunctionalGroup) {
        let group_type = group.group_type();
        if self
            .per_frame
            .entry(frame)
            .or_default()
            .insert(group)
            .is_some()
        {
            debug!(
                "Replacing per-frame group for frame {}, type: {}",
                frame, group_type
            );
        }
    }

    /// Move the shared group of the given type into every known frame,
    /// except for `skip`, which is about to receive its own group.
    ///
    /// All copies are made before the store is touched,
    /// so running out of memory leaves the store as it was.
    fn demote(&mut self, group_type: GroupType, skip: Option<FrameIndex>) -> Result<()> {
        let shared = match self.shared.find(group_type) {
            Some(group) => group,
            None => return Ok(()),
        };
        let targets: Vec<FrameIndex> = self
            .per_frame
            .keys()
            .copied()
            .filter(|f| Some(*f) != skip)
            .collect();

        let mut copies = Vec::new();
        copies
            .try_reserve_exact(targets.len())
            .context(MemoryExhaustedSnafu {
                group_type,
                frames: targets.len(),
            })?;
        copies.extend(targets.iter().map(|_| shared.clone()));

        self.shared.remove(group_type);
        for (frame, copy) in targets.into_iter().zip(copies) {
            self.insert_per_frame(frame, copy);
        }
        Ok(())
    }
}
