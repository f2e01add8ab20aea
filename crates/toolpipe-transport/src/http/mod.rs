//! HTTP-side support: readiness polling for tool servers that listen on a
//! socket instead of stdio.

mod health;

pub use health::{
    HealthCheckConfig, HealthReport, HealthWaiter, HttpServerSpec, health_url, wait_until_healthy,
};
