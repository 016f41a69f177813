// Copyright 2025 The gitserv Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Optional CPU profile capture around the dispatch step.
//!
//! Started only when `--enable-pprof` is set, after authorization has
//! already completed, so profiling can never delay a decision.

use std::path::{Path, PathBuf};

use pprof::ProfilerGuardBuilder;

use crate::error::ServError;

/// A running CPU profiler; dropped or stopped after the dispatched
/// subprocess finishes.
pub struct CpuProfiler {
    guard: pprof::ProfilerGuard<'static>,
    output: PathBuf,
}

/// Start sampling and reserve an output path under `data_path`, named
/// after the owner being served.
pub fn start(data_path: &Path, owner: &str) -> Result<CpuProfiler, ServError> {
    std::fs::create_dir_all(data_path).map_err(|e| ServError::Internal {
        detail: format!("failed to create profile data path {data_path:?}: {e}"),
    })?;

    let guard = ProfilerGuardBuilder::default()
        .frequency(99)
        .blocklist(&["libc", "libgcc", "pthread", "vdso"])
        .build()
        .map_err(|e| ServError::Internal {
            detail: format!("failed to start CPU profiler: {e}"),
        })?;

    let output = data_path.join(format!("cpuprofile_{}_{}.svg", owner, std::process::id()));
    Ok(CpuProfiler { guard, output })
}

impl CpuProfiler {
    /// Stop sampling and write a flamegraph.
    pub fn stop(self) -> Result<(), ServError> {
        let report = self
            .guard
            .report()
            .build()
            .map_err(|e| ServError::Internal {
                detail: format!("failed to build CPU profile report: {e}"),
            })?;

        let file = std::fs::File::create(&self.output).map_err(|e| ServError::Internal {
            detail: format!("failed to create profile output {:?}: {e}", self.output),
        })?;
        report.flamegraph(file).map_err(|e| ServError::Internal {
            detail: format!("failed to write flamegraph: {e}"),
        })?;

        tracing::debug!("wrote CPU profile to {:?}", self.output);
        Ok(())
    }
}
