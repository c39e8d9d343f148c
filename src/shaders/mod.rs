// SPDX-License-Identifier: GPL-3.0-only

//! WGSL sources and shared GPU helpers

pub mod gpu_processor;

pub use gpu_processor::{CachedDimensions, padded_bytes_per_row, read_buffer_async};

/// Compositor shader: `vs_main`, `fs_wide` (depth + confidence) and
/// `fs_front` (depth only)
pub const COMPOSITE_SHADER: &str = include_str!("composite.wgsl");

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY_WIDE: &str = "fs_wide";
pub const FRAGMENT_ENTRY_FRONT: &str = "fs_front";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_and_validate(source: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|e| panic!("WGSL parse error:\n{}", e.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|e| panic!("WGSL validation error: {e:?}"));
        module
    }

    #[test]
    fn composite_shader_validates() {
        parse_and_validate(COMPOSITE_SHADER);
    }

    #[test]
    fn composite_shader_exposes_entry_points() {
        let module = parse_and_validate(COMPOSITE_SHADER);
        let names: Vec<&str> = module
            .entry_points
            .iter()
            .map(|ep| ep.name.as_str())
            .collect();
        for expected in [VERTEX_ENTRY, FRAGMENT_ENTRY_WIDE, FRAGMENT_ENTRY_FRONT] {
            assert!(names.contains(&expected), "missing entry point {expected}");
        }
    }
}
