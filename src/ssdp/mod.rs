/*!
SSDP (component I, §1 Discovery): device-side advertisement ([`notify`]),
the search request/response path shared by both sides ([`search`]), the
notification-type/search-target vocabulary ([`protocol`]), and the
HTTPMU/HTTPU transport both build on ([`httpu`]).

Grounded on the teacher's `ssdp` module, which split the same concerns
the same way; the teacher's own `mod.rs` additionally defined a
`ControlPoint`/`ProductVersion` pair that this crate folds into
[`crate::handle::ClientHandle`] and [`crate::webserver::server_header`]
respectively, so it is not reproduced here.
*/
pub mod httpu;
pub mod notify;
pub mod protocol;
pub mod search;
