//! Script host used when replaying event streams from the command line.

use arbor_dom::script::{ScriptFetch, ScriptHost, ScriptLoadError, ScriptSourceCode};
use arbor_dom::{DomTree, NodeId};
use log::info;

/// Logs scripts instead of running them. External scripts are refused, so
/// the parser never waits on a load.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportingHost;

impl ScriptHost for ReportingHost {
    fn fetch_script(&mut self, element: NodeId, url: &str, _charset: &str) -> ScriptFetch {
        info!(target: "arbor::cli", "refusing external script {url} for {element:?}");
        ScriptFetch::Failed(ScriptLoadError::Blocked)
    }

    fn execute_script(&mut self, _dom: &mut DomTree, source: &ScriptSourceCode) {
        info!(
            target: "arbor::cli",
            "script at {}:{} ({} bytes)",
            source.start.line,
            source.start.column,
            source.source.len()
        );
    }
}
