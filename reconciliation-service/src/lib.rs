//! Reconciliation Service - bank file parsing, SEPA generation and payment
//! reconciliation.

pub mod config;
pub mod dtos;
pub mod error;
pub mod formats;
pub mod handlers;
pub mod matching;
pub mod models;
pub mod sepa;
pub mod services;
pub mod startup;
