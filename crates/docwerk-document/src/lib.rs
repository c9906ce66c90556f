// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docwerk-document — Everything Docwerk does to files on disk without an
// external engine.
//
// Provides input validation (extension, size, container integrity) with a
// TTL cache, leveled recompression of produced PDFs, and the image pipeline
// the compressor uses to re-encode embedded pictures.

pub mod files;
pub mod image;
pub mod pdf;
pub mod validate;

pub use files::{collect_documents, estimate_pdf_size, human_size};
pub use self::image::processor::ImageProcessor;
pub use pdf::compress::{CompressionReport, PdfCompressor};
pub use validate::FileValidator;
