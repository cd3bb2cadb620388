//! # Siteport
//!
//! A post-processor for statically exported websites. Site builders dump a
//! tree of HTML, CSS, and assets whose names carry the builder's
//! fingerprints: marker-prefixed asset names, mixed-case filenames that
//! break on case-sensitive hosting, virtual URLs that only resolve through
//! an `.htaccess` nobody deploys, and tracking scripts that make no sense
//! off the builder's servers. Siteport walks the exported tree once and
//! makes it self-consistent and deployable anywhere.
//!
//! # Architecture: Six-Stage Pipeline
//!
//! A `fix` run executes six sequential stages over the tree:
//!
//! ```text
//! 1. Assets   rename marker-named files, delete junk     (seeds rename map)
//! 2. Scrub    clean robots/readme remnants + 404 page
//! 3. Case     lower-case filenames + their references    (extends rename map)
//! 4. Routes   parse .htaccess rewrite rules              (builds route table)
//! 5. Rewrite  resolve every reference in every text file (consumes both)
//! 6. Audit    read-only existence check of all links     (reports what's left)
//! ```
//!
//! The backbone of the design is the [`renames::RenameMap`]: every stage
//! that moves a file records the move, and the map keeps itself *closed* —
//! chains collapse on insert, so resolving a reference is always a single
//! lookup no matter how many times a file was renamed. The map is dumped
//! as a JSON artifact at the end of each run.
//!
//! References resolve in a fixed precedence order: routing rules first,
//! then known static-folder prefixes, then the rename map, and finally the
//! filesystem itself. Whatever still misses is counted and reported as
//! broken — the tree is never annotated, and per-file failures become
//! warnings rather than aborting the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`assets`] | Stage 1 — marker renames, junk deletion, placeholder asset |
//! | [`scrub`] | Stage 2 — robots/readme remnant scrubbing, 404-page normalization |
//! | [`casing`] | Stage 3 — filename case normalization and reference updates |
//! | [`routes`] | Stage 4 — `.htaccess` directive parsing into a route table |
//! | [`rewrite`] | Stage 5 — reference extraction, resolution, and rewriting |
//! | [`audit`] | Stage 6 — read-only link verification |
//! | [`renames`] | The closed old→new rename map shared by all stages |
//! | [`pipeline`] | Stage sequencing, run statistics, rename-map artifact |
//! | [`config`] | `siteport.toml` loading and validation |
//! | [`walk`] | Tree traversal and text file IO helpers |
//! | [`output`] | CLI output formatting for run results |

pub mod assets;
pub mod audit;
pub mod casing;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod renames;
pub mod rewrite;
pub mod routes;
pub mod scrub;
pub mod walk;
