pub mod face_slot;
pub mod face_slot_tracker;
