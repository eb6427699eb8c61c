//! Hardware-agnostic building blocks shared by the relay firmware:
//! network endpoint handling and magic-header persistent storage.

#![no_std]

pub mod net;
pub mod storage;
