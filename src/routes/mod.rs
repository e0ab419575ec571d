/**
 * Routes Module
 * HTTP handlers
 */

pub mod health;
pub mod rpc;
