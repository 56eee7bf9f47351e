#![allow(dead_code)]
pub mod marketplace;
pub mod stub_processor;
