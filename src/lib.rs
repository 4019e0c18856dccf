//! # AnalystOS client
//!
//! Client-side plumbing for the AnalystOS research backend: a typed HTTP
//! client with session-scoped bearer auth, the auth state machine, a job
//! poller, periodic dashboard refreshes, and a development proxy that
//! forwards a local UI origin to the backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ AuthSession  │──▶│  ApiClient   │──▶│    Backend     │
//! │ state, guard │   │ cookie/bearer│   │ /auth /research│
//! └──────┬───────┘   └──────┬───────┘   │ /crypto /autom.│
//!        │                  │           └───────▲────────┘
//!        ▼                  ▼                   │
//!  ┌────────────┐   ┌──────────────┐   ┌────────┴───────┐
//!  │  Session   │   │ poll_job,    │   │   dev proxy    │
//!  │ token slot │   │ refresh      │   │  /api/* → API  │
//!  └────────────┘   └──────────────┘   └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! aos serve proxy                         # forward /api/* to the backend
//! aos auth whoami                         # log in with AOS_USERNAME/AOS_PASSWORD
//! aos research generate --model anthropic/claude-sonnet-4.5 --source <job> --wait
//! aos research download <report-id> --out report.md
//! aos watch                               # periodic automation + market refresh
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Client error type |
//! | [`models`] | Jobs, reports, and auth payloads |
//! | [`session`] | In-memory access-token slot |
//! | [`client`] | HTTP client wrapper |
//! | [`auth`] | Auth state machine and route guard |
//! | [`jobs`] | Job polling loop |
//! | [`research`] | `/research/*` endpoints |
//! | [`crypto`] | `/crypto/*` endpoints |
//! | [`automation`] | `/automation/*` endpoints |
//! | [`refresh`] | Periodic refresh timers |
//! | [`proxy`] | Development request proxy |
//! | [`telemetry`] | Logging setup |

pub mod auth;
pub mod automation;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod jobs;
pub mod models;
pub mod proxy;
pub mod refresh;
pub mod research;
pub mod session;
pub mod telemetry;
