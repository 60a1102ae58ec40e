#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod client;
pub use client::*;

pub mod protocol;
