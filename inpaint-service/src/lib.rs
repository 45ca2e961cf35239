//! inpaint-service: authenticated multipart front end for a hosted
//! inpainting model.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod startup;
