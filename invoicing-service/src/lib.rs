//! Invoicing Service - invoice lifecycle with multi-level approval.

pub mod approval;
pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
