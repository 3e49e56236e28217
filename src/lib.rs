//! Post-processing of rendered documentation HTML: identifiers inside code
//! blocks become links to their reference pages, headings that name a
//! library symbol gain a `[source]` link pinned to the current commit.

pub mod codeblocks;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod grammar;
pub mod headings;
pub mod index;
pub mod info;
pub mod inventory;
pub mod page;
pub mod registry;
pub mod resolver;
pub mod rewrite;
pub mod site;
pub mod types;
pub mod vcs;
