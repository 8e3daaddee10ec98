use std::collections::BTreeSet;

use cutline_api::timeline::{GroupId, GroupMember, ItemId};
use cutline_api::{Error, Result};
use cutline_core::collections::HashMap;

/// Group tree. `parents` and `children` always mirror each other, and
/// following parents from any member terminates at a root.
#[derive(Debug, Clone, Default)]
pub struct Groups {
    parents: HashMap<GroupMember, GroupId>,
    children: HashMap<GroupId, BTreeSet<GroupMember>>,
}

impl Groups {
    pub fn contains(&self, group: GroupId) -> bool {
        self.children.contains_key(&group)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn parent(&self, member: GroupMember) -> Option<GroupId> {
        self.parents.get(&member).copied()
    }

    pub fn members(&self, group: GroupId) -> Option<&BTreeSet<GroupMember>> {
        self.children.get(&group)
    }

    /// Topmost ancestor of `member`, or the member itself when ungrouped.
    pub fn root(&self, member: GroupMember) -> GroupMember {
        let mut current = member;
        while let Some(&parent) = self.parents.get(&current) {
            current = GroupMember::Group(parent);
        }
        current
    }

    /// Every item below `member`, including `member` itself if it is one.
    pub fn leaves(&self, member: GroupMember) -> Vec<ItemId> {
        let mut leaves = Vec::new();
        let mut stack = vec![member];

        while let Some(member) = stack.pop() {
            match member {
                GroupMember::Item(id) => leaves.push(id),
                GroupMember::Group(id) => {
                    if let Some(children) = self.children.get(&id) {
                        stack.extend(children.iter().rev().copied());
                    }
                }
            }
        }

        leaves
    }

    /// Creates `group` over `members`, which must all currently be direct
    /// children of `parent` (or roots when `parent` is `None`).
    pub(crate) fn create(
        &mut self,
        group: GroupId,
        members: &[GroupMember],
        parent: Option<GroupId>,
    ) -> Result<()> {
        if self.children.contains_key(&group) {
            return Err(Error::new_internal(format!("group {group} already exists")));
        }

        if let Some(parent) = parent {
            if !self.children.contains_key(&parent) {
                return Err(Error::InvalidId);
            }
        }

        for member in members {
            if *member == GroupMember::Group(group) || self.parent(*member) != parent {
                return Err(Error::new_internal(format!(
                    "{member:?} cannot join group {group}"
                )));
            }
        }

        for &member in members {
            if let Some(parent) = parent {
                self.detach_child(parent, member);
            }
            self.parents.insert(member, group);
        }

        self.children.insert(group, members.iter().copied().collect());

        if let Some(parent) = parent {
            self.parents.insert(GroupMember::Group(group), parent);
            self.children
                .entry(parent)
                .or_default()
                .insert(GroupMember::Group(group));
        }

        Ok(())
    }

    /// Removes `group` and hands its children to its parent. Returns the
    /// former children and parent.
    pub(crate) fn dissolve(
        &mut self,
        group: GroupId,
    ) -> Result<(Vec<GroupMember>, Option<GroupId>)> {
        let members = self.children.remove(&group).ok_or(Error::InvalidId)?;
        let parent = self.parents.remove(&GroupMember::Group(group));

        if let Some(parent) = parent {
            self.detach_child(parent, GroupMember::Group(group));
        }

        for &member in &members {
            match parent {
                Some(parent) => {
                    self.parents.insert(member, parent);
                    self.children.entry(parent).or_default().insert(member);
                }
                None => {
                    self.parents.remove(&member);
                }
            }
        }

        Ok((members.into_iter().collect(), parent))
    }

    pub(crate) fn attach(&mut self, member: GroupMember, group: GroupId) -> Result<()> {
        if self.parents.contains_key(&member) {
            return Err(Error::new_internal(format!("{member:?} is already grouped")));
        }

        let children = self.children.get_mut(&group).ok_or(Error::InvalidId)?;
        children.insert(member);
        self.parents.insert(member, group);
        Ok(())
    }

    pub(crate) fn detach(&mut self, member: GroupMember, group: GroupId) -> Result<()> {
        if self.parents.get(&member) != Some(&group) {
            return Err(Error::new_internal(format!(
                "{member:?} is not in group {group}"
            )));
        }

        self.parents.remove(&member);
        self.detach_child(group, member);
        Ok(())
    }

    fn detach_child(&mut self, group: GroupId, member: GroupMember) {
        if let Some(children) = self.children.get_mut(&group) {
            children.remove(&member);
        }
    }

    /// Verifies symmetry and acyclicity. Used by tests.
    pub fn check(&self) -> Result<()> {
        for (member, group) in &self.parents {
            let listed = self.children.get(group).is_some_and(|c| c.contains(member));
            if !listed {
                return Err(Error::new_internal(format!("{member:?} missing from {group}")));
            }
        }

        for (group, children) in &self.children {
            for child in children {
                if self.parents.get(child) != Some(group) {
                    return Err(Error::new_internal(format!("{child:?} has wrong parent")));
                }
            }

            let mut seen = 0;
            let mut current = GroupMember::Group(*group);
            while let Some(&parent) = self.parents.get(&current) {
                seen += 1;
                if seen > self.children.len() {
                    return Err(Error::new_internal(format!("cycle through {group}")));
                }
                current = GroupMember::Group(parent);
            }
        }

        Ok(())
    }
}
