//! Human-readable run reports.

use std::fmt::Write;

use wavelock_core::{PipelineOutcome, PipelineResult};

/// Render the stage log and, on success, the result block.
pub fn render(name: &str, outcome: &PipelineOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "### {name} (run {}) ###", outcome.run_id);
    for status in &outcome.log {
        let mark = if status.succeeded { "ok" } else { "FAILED" };
        let _ = writeln!(out, "[{mark:>6}] {status}");
    }
    if let Some(result) = &outcome.result {
        render_result(&mut out, result);
    }
    out
}

fn render_result(out: &mut String, result: &PipelineResult) {
    let m = &result.compression_metrics;
    let s = &result.size_comparison;
    let t = &result.timings;
    let l = &result.locations;

    let _ = writeln!(out, "File Name: {}", result.file_name);
    let _ = writeln!(
        out,
        "Compression Metrics: PSNR {:.2} dB, SSIM {:.4}, ratio {:.3}{}",
        m.psnr,
        m.ssim,
        m.compression_ratio,
        if m.resampled { " (resampled)" } else { "" }
    );
    let _ = writeln!(
        out,
        "Size Comparison: original {} B, metadata {} B, delta {:+} B ({:+.2}%)",
        s.original_size, s.metadata_size, s.byte_delta, s.percent_delta
    );
    let _ = writeln!(out, "Content Hash: {}", result.content_hash);
    let _ = writeln!(
        out,
        "Embedded Tag: {}",
        result.embedded_tag.as_deref().unwrap_or("(format has no text metadata)")
    );
    let _ = writeln!(out, "Encrypted Blob: {}", l.encrypted_path.display());
    let _ = writeln!(out, "Compressed Image URI: {}", l.compressed_uri);
    let _ = writeln!(out, "Metadata-Embedded Image URI: {}", l.metadata_uri);
    let _ = writeln!(
        out,
        "Timings: compression {:.2}s, encryption {:.2}s, metadata {:.2}s, upload {:.2}s, overall {:.2}s",
        t.compression.as_secs_f64(),
        t.encryption.as_secs_f64(),
        t.metadata_embedding.as_secs_f64(),
        t.upload.as_secs_f64(),
        t.overall.as_secs_f64()
    );
}
