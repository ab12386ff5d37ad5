//! In-memory store and recording sink for engine tests.

extern crate std;

use core::cell::RefCell;
use std::collections::HashMap;
use std::string::String;
use std::vec::Vec;

use chromatic_proto::record::RECORD_SIZE;
use chromatic_proto::CheatPoke;

use super::{CheatEngine, CheatSink, CheatStore};

#[derive(Default)]
pub struct MemoryStore {
    pub records: HashMap<String, [u8; RECORD_SIZE]>,
    pub saves: usize,
}

impl CheatStore for MemoryStore {
    type Error = ();

    fn load(&mut self, key: &str, buf: &mut [u8; RECORD_SIZE]) -> Result<bool, ()> {
        match self.records.get(key) {
            Some(record) => {
                buf.copy_from_slice(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn save(&mut self, key: &str, record: &[u8; RECORD_SIZE]) -> Result<(), ()> {
        self.saves += 1;
        self.records.insert(String::from(key), *record);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pokes: RefCell<Vec<CheatPoke>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<CheatPoke> {
        self.pokes.take()
    }
}

impl CheatSink for RecordingSink {
    fn send_cheat(&self, poke: CheatPoke) {
        self.pokes.borrow_mut().push(poke);
    }
}

pub fn engine() -> CheatEngine<MemoryStore, RecordingSink> {
    CheatEngine::new(MemoryStore::default(), RecordingSink::default())
}
