// MIT License - Copyright (c) 2026 Peter Wright
// Panel transport

pub mod command;
pub mod direct;
