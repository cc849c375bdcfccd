//! Slab - generational slot storage for heap nodes
//!
//! Freed slots go on a free list and are reused LIFO. Every reuse bumps the
//! slot generation, so an `ObjectId` issued before the free no longer
//! matches and lookups through it fail.

use crate::object::{Object, ObjectId};

struct Slot {
    generation: u32,
    object: Option<Object>,
}

#[derive(Default)]
pub(crate) struct Slab {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
}

impl Slab {
    /// Store the node built by `build`, which receives the node's own id
    pub fn insert_with(&mut self, build: impl FnOnce(ObjectId) -> Object) -> ObjectId {
        let id = match self.free_list.pop() {
            Some(index) => ObjectId::new(index, self.slots[index as usize].generation),
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    object: None,
                });
                ObjectId::new((self.slots.len() - 1) as u32, 0)
            },
        };

        self.slots[id.index()].object = Some(build(id));
        self.live += 1;
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.object.as_mut())
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Object> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())?;
        let object = slot.object.take()?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index() as u32);
        self.live -= 1;
        Some(object)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.object
                .as_ref()
                .map(|_| ObjectId::new(i as u32, slot.generation))
        })
    }
}
