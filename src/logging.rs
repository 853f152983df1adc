/**
 * ============================================================================
 * LOGGING MODULE
 * ============================================================================
 *
 * PURPOSE: Log level policy for the host application
 *
 * The crate only uses the `log` facade. Hosts install their own logger and
 * apply these per-module levels, e.g.
 *
 *   for (module, level) in logging::MODULE_LEVELS { builder.level_for(module, level) }
 *
 * ============================================================================
 */

use log::LevelFilter;

/// Level for anything not listed below
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

/// Most specific module path first
pub const MODULE_LEVELS: &[(&str, LevelFilter)] = &[
    ("realityflux_lib::gemini::dispatcher", LevelFilter::Debug),
    ("realityflux_lib::gemini", LevelFilter::Info),
    ("realityflux_lib::media", LevelFilter::Info),
    ("realityflux_lib::studio", LevelFilter::Info),
    ("realityflux_lib::live", LevelFilter::Info),
    ("realityflux_lib", LevelFilter::Info),
    ("reqwest", LevelFilter::Warn),
];

/**
 * Level filter for a log target
 * Matches on whole path segments, so "realityflux_lib::mediax" falls back
 */
pub fn level_for_module(target: &str) -> LevelFilter {
    MODULE_LEVELS
        .iter()
        .filter(|(module, _)| {
            target == *module
                || target
                    .strip_prefix(module)
                    .is_some_and(|rest| rest.starts_with("::"))
        })
        .max_by_key(|(module, _)| module.len())
        .map(|(_, level)| *level)
        .unwrap_or(DEFAULT_LEVEL)
}
