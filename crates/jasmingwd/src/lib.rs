//! `jasmingwd`: the main Jasmin gateway daemon. Wires the Router Core to
//! the HTTP submission API, the deliver_sm/dlr throwers, and the admin
//! JSON-RPC surface (§6.1) — the one binary that owns all of the
//! in-process collaborators the other per-concern crates only define.

pub mod admin_server;
