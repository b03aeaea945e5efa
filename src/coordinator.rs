// Copyright (c) Microsoft Corporation.
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use crate::constants;
use crate::filter::{Filter, PropertyDenialFilter, RawDenialFilter, RecordGeneratorFilter};
use crate::pipeline::{CapturePipeline, CaptureSummary, ShutdownFlag};
use crate::properties::PropertyStore;
use crate::source::{KernelLogSource, LogcatSource, Source};
use crate::util::record_boot_time;

/// What ends a capture session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopCondition {
    /// `sys.boot_completed` becomes 1; the boot time is then recorded
    BootCompleted,
    /// The logger's enable property is switched off
    Disabled,
}

impl StopCondition {
    /// The property and value that end the session
    pub fn property(self) -> (&'static str, &'static str) {
        match self {
            StopCondition::BootCompleted => (constants::BOOT_COMPLETED_PROP, "1"),
            StopCondition::Disabled => (constants::LOGGER_ENABLED_PROP, "false"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub directory: PathBuf,
    pub has_audit: bool,
    pub stop: StopCondition,
    /// None waits forever
    pub timeout: Option<Duration>,
    pub uptime_path: PathBuf,
    pub kmsg_path: PathBuf,
}

impl CoordinatorConfig {
    pub fn new(directory: &Path, has_audit: bool, stop: StopCondition) -> Self {
        CoordinatorConfig {
            directory: directory.to_path_buf(),
            has_audit,
            stop,
            timeout: None,
            uptime_path: PathBuf::from(constants::UPTIME_PATH),
            kmsg_path: PathBuf::from(constants::KMSG_DEVICE),
        }
    }
}

/// Results per pipeline, by source name
#[derive(Clone, Debug, Default)]
pub struct SessionReport {
    pub pipelines: Vec<(&'static str, CaptureSummary)>,
}

impl SessionReport {
    pub fn get(&self, name: &str) -> Option<&CaptureSummary> {
        self.pipelines
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| s)
    }
}

pub struct Coordinator<P: PropertyStore> {
    config: CoordinatorConfig,
    properties: P,
    kernel_source: Box<dyn Source>,
    user_source: Box<dyn Source>,
}

impl<P: PropertyStore> Coordinator<P> {
    pub fn new(config: CoordinatorConfig, properties: P) -> Self {
        Coordinator {
            config,
            properties,
            kernel_source: Box::new(KernelLogSource::new()),
            user_source: Box::new(LogcatSource::new()),
        }
    }

    pub fn with_kernel_source(mut self, source: Box<dyn Source>) -> Self {
        self.kernel_source = source;
        self
    }

    pub fn with_user_source(mut self, source: Box<dyn Source>) -> Self {
        self.user_source = source;
        self
    }

    fn spawn(
        pipeline: CapturePipeline,
    ) -> Option<(&'static str, JoinHandle<CaptureSummary>)> {
        let name = pipeline.name();
        let mut pipeline = pipeline;
        match thread::Builder::new()
            .name(name.to_string())
            .spawn(move || pipeline.run())
        {
            Ok(handle) => Some((name, handle)),
            Err(e) => {
                error!("Failed to start logger {}: {}", name, e);
                None
            }
        }
    }

    /// Run one capture session to completion
    pub fn run(self) -> SessionReport {
        let Coordinator {
            config,
            properties,
            kernel_source,
            user_source,
        } = self;
        let shutdown = ShutdownFlag::new();
        let mut handles = Vec::new();

        // logd may already copy kernel messages into logcat; capturing both
        // would duplicate (and race) them
        if properties.get_bool(constants::LOGD_KERNEL_PROP, false) {
            info!("Kernel logs are already in logcat, skipping the kernel logger");
        } else {
            let kernel = CapturePipeline::new(
                kernel_source,
                kernel_filters(config.has_audit),
                &config.directory,
                shutdown.clone(),
            );
            handles.extend(Self::spawn(kernel));
        }
        let user = CapturePipeline::new(
            user_source,
            user_filters(),
            &config.directory,
            shutdown.clone(),
        );
        handles.extend(Self::spawn(user));

        wait_for_stop(&config, &properties);
        info!("Woke up, waiting for threads to finish");
        shutdown.trigger();

        let mut report = SessionReport::default();
        for (name, handle) in handles {
            match handle.join() {
                Ok(summary) => report.pipelines.push((name, summary)),
                Err(_) => error!("Logger {} panicked", name),
            }
        }
        info!("Logger stopped");
        report
    }
}

fn kernel_filters(has_audit: bool) -> Vec<Box<dyn Filter>> {
    if has_audit {
        vec![
            Box::new(RawDenialFilter::new()),
            Box::new(RecordGeneratorFilter::new()),
        ]
    } else {
        Vec::new()
    }
}

fn user_filters() -> Vec<Box<dyn Filter>> {
    vec![
        Box::new(RawDenialFilter::new()),
        Box::new(RecordGeneratorFilter::new()),
        Box::new(PropertyDenialFilter::new()),
    ]
}

fn wait_for_stop<P: PropertyStore>(config: &CoordinatorConfig, properties: &P) {
    let (key, value) = config.stop.property();
    info!("Logging until {} is {}", key, value);
    if !properties.wait_for(key, value, config.timeout) {
        info!("Timed out waiting for {}={}", key, value);
    } else if config.stop == StopCondition::BootCompleted {
        record_boot_time(&config.uptime_path, &config.kmsg_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorItem;
    use std::collections::{HashMap, VecDeque};
    use std::fs;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedSource {
        name: &'static str,
        chunks: VecDeque<String>,
        // Bumped once when this source runs dry
        exhausted: Arc<AtomicUsize>,
        done: bool,
    }

    impl ScriptedSource {
        fn boxed(
            name: &'static str,
            chunks: &[&str],
            exhausted: &Arc<AtomicUsize>,
        ) -> Box<dyn Source> {
            Box::new(ScriptedSource {
                name,
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                exhausted: exhausted.clone(),
                done: false,
            })
        }
    }

    impl Source for ScriptedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn open(&mut self) -> Result<(), ErrorItem> {
            Ok(())
        }

        fn read_chunk(&mut self) -> io::Result<Option<String>> {
            let next = self.chunks.pop_front();
            if next.is_none() && !self.done {
                self.done = true;
                self.exhausted.fetch_add(1, Ordering::SeqCst);
            }
            Ok(next)
        }

        fn close(&mut self) {}
    }

    /// Reports the stop condition once `expected` sources have run dry
    struct FakeProperties {
        values: HashMap<String, String>,
        exhausted: Arc<AtomicUsize>,
        expected: usize,
        waited_for: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl FakeProperties {
        fn new(exhausted: &Arc<AtomicUsize>, expected: usize) -> Self {
            FakeProperties {
                values: HashMap::new(),
                exhausted: exhausted.clone(),
                expected,
                waited_for: Default::default(),
            }
        }
    }

    impl PropertyStore for FakeProperties {
        fn get(&self, key: &str) -> Option<String> {
            self.values.get(key).cloned()
        }

        fn wait_for(&self, key: &str, value: &str, _timeout: Option<Duration>) -> bool {
            self.waited_for
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string()));
            while self.exhausted.load(Ordering::SeqCst) < self.expected {
                thread::sleep(Duration::from_millis(1));
            }
            true
        }
    }

    const KERNEL_DENIAL: &str = "avc: denied { write } for name=\"x\" scontext=u:r:init:s0 tcontext=u:object_r:proc:s0 tclass=file permissive=0\n";
    const USER_DENIAL: &str = "avc: denied { find } for pid=1 scontext=u:r:system_app:s0 tcontext=u:object_r:foo_service:s0 tclass=service_manager permissive=0\n";

    fn config(dir: &Path, has_audit: bool, stop: StopCondition) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::new(dir, has_audit, stop);
        config.uptime_path = dir.join("missing_uptime");
        config.kmsg_path = dir.join("missing_kmsg");
        config
    }

    #[test]
    fn both_loggers_run() {
        let dir = tempfile::tempdir().unwrap();
        let exhausted = Arc::new(AtomicUsize::new(0));
        let props = FakeProperties::new(&exhausted, 2);
        let report = Coordinator::new(
            config(dir.path(), true, StopCondition::Disabled),
            props,
        )
        .with_kernel_source(ScriptedSource::boxed("dmesg", &[KERNEL_DENIAL], &exhausted))
        .with_user_source(ScriptedSource::boxed("logcat", &[USER_DENIAL], &exhausted))
        .run();

        assert_eq!(report.pipelines.len(), 2);
        let kernel = report.get("dmesg").unwrap();
        assert_eq!(kernel.lines, 1);
        assert_eq!(kernel.artifacts.len(), 2);
        let user = report.get("logcat").unwrap();
        assert_eq!(user.lines, 1);
        assert_eq!(user.artifacts.len(), 2);

        let generated = user
            .artifacts
            .iter()
            .find(|p| p.to_string_lossy().contains("logcat.sepolicy.gen-"))
            .unwrap();
        assert_eq!(
            fs::read_to_string(generated).unwrap(),
            "allow system_app foo_service:service_manager find;\n"
        );
    }

    #[test]
    fn kernel_logger_skipped_when_logd_has_kernel_logs() {
        let dir = tempfile::tempdir().unwrap();
        let exhausted = Arc::new(AtomicUsize::new(0));
        let mut props = FakeProperties::new(&exhausted, 1);
        props
            .values
            .insert(constants::LOGD_KERNEL_PROP.to_string(), "true".to_string());
        let report = Coordinator::new(
            config(dir.path(), true, StopCondition::Disabled),
            props,
        )
        .with_kernel_source(ScriptedSource::boxed("dmesg", &[KERNEL_DENIAL], &exhausted))
        .with_user_source(ScriptedSource::boxed("logcat", &[USER_DENIAL], &exhausted))
        .run();

        assert_eq!(report.pipelines.len(), 1);
        assert!(report.get("dmesg").is_none());
        assert!(report.get("logcat").is_some());
        assert!(fs::read_dir(dir.path())
            .unwrap()
            .all(|e| e.unwrap().file_name().to_string_lossy().starts_with("logcat")));
    }

    #[test]
    fn kernel_filters_need_audit() {
        let dir = tempfile::tempdir().unwrap();
        let exhausted = Arc::new(AtomicUsize::new(0));
        let props = FakeProperties::new(&exhausted, 2);
        let report = Coordinator::new(
            config(dir.path(), false, StopCondition::Disabled),
            props,
        )
        .with_kernel_source(ScriptedSource::boxed("dmesg", &[KERNEL_DENIAL], &exhausted))
        .with_user_source(ScriptedSource::boxed("logcat", &[], &exhausted))
        .run();

        let kernel = report.get("dmesg").unwrap();
        assert!(kernel.raw_log.is_some());
        assert!(kernel.artifacts.is_empty());
        // Nothing captured from logcat, so no raw file either
        assert_eq!(report.get("logcat").unwrap().raw_log, None);
    }

    #[test]
    fn stop_conditions() {
        let dir = tempfile::tempdir().unwrap();
        let exhausted = Arc::new(AtomicUsize::new(0));
        let props = FakeProperties::new(&exhausted, 0);
        let config = config(dir.path(), true, StopCondition::BootCompleted);
        wait_for_stop(&config, &props);
        let props_disabled = FakeProperties::new(&exhausted, 0);
        wait_for_stop(
            &CoordinatorConfig {
                stop: StopCondition::Disabled,
                ..config.clone()
            },
            &props_disabled,
        );

        assert_eq!(
            props.waited_for.lock().unwrap().as_slice(),
            &[(
                constants::BOOT_COMPLETED_PROP.to_string(),
                "1".to_string()
            )]
        );
        assert_eq!(
            props_disabled.waited_for.lock().unwrap().as_slice(),
            &[(
                constants::LOGGER_ENABLED_PROP.to_string(),
                "false".to_string()
            )]
        );
    }

    #[test]
    fn disabled_mode_waits_on_logger_property() {
        assert_eq!(
            StopCondition::Disabled.property(),
            ("persist.ext.logdump.enabled", "false")
        );
        assert_eq!(
            StopCondition::BootCompleted.property(),
            ("sys.boot_completed", "1")
        );
    }

    #[test]
    fn boot_completed_records_boot_time() {
        let dir = tempfile::tempdir().unwrap();
        let exhausted = Arc::new(AtomicUsize::new(0));
        let props = FakeProperties::new(&exhausted, 0);
        let mut config = config(dir.path(), true, StopCondition::BootCompleted);
        config.uptime_path = dir.path().join("uptime");
        config.kmsg_path = dir.path().join("kmsg");
        fs::write(&config.uptime_path, "90.5 12.0\n").unwrap();
        fs::write(&config.kmsg_path, "").unwrap();

        wait_for_stop(&config, &props);
        assert_eq!(
            fs::read_to_string(&config.kmsg_path).unwrap(),
            "Boot completed in 01m30s"
        );
    }
}
