//! Top committers of an organization
//!
//! # Overview
//!
//! Library ranks the people who commit to the repositories of a GitHub organization.
//! Given an organization name, it lists every repository of the organization, skips the empty ones and fetches the full commit history of the rest, one concurrent task per repository.
//! Commits are counted per author email; merge commits generated by GitHub when a pull request is merged (`Merge pull request #...`) are ignored, as they credit the person who merged rather than the author.
//! Authors are returned sorted by commit count, authors with equal counts in the order they were first seen.
//!
//! The `api` feature exposes only the [`api::Client`] abstraction, `committers` adds the fetching and ranking machinery.

#[cfg(feature = "api")]
pub mod api;

#[cfg(feature = "committers")]
pub mod aggregator;
#[cfg(feature = "committers")]
mod committers;
#[cfg(feature = "committers")]
pub mod fetcher;

#[cfg(all(test, feature = "committers"))]
mod testing;

#[cfg(feature = "committers")]
pub use committers::TopCommitters;
