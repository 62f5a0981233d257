use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Static plus learned performance characteristics for one tool.
#[derive(Debug, Clone)]
pub struct ToolProfile {
    pub name: String,
    pub average_latency: Duration,
    pub success_rate: f64,
    pub cost_per_call: f64,
    pub cache_compatible: bool,
    pub default_cache_ttl: Duration,
    pub parallel_safe: bool,
    pub max_retries: u32,
    pub timeout: Duration,
    pub complexity: f64,
}

impl ToolProfile {
    /// Conservative profile for tools we have no data on.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            average_latency: Duration::from_secs(2),
            success_rate: 0.9,
            cost_per_call: 0.0,
            cache_compatible: false,
            default_cache_ttl: Duration::from_secs(300),
            parallel_safe: true,
            max_retries: 2,
            timeout: Duration::from_secs(30),
            complexity: 0.5,
        }
    }
}

/// Process-wide store of tool profiles. Seeded with defaults at startup,
/// updatable at runtime, never cleared.
pub struct ProfileStore {
    profiles: RwLock<HashMap<String, ToolProfile>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        let store = Self::new();
        for profile in default_profiles() {
            store.update(profile);
        }
        store
    }

    /// Profile for a tool, falling back to a conservative default.
    pub fn profile_for(&self, name: &str) -> ToolProfile {
        self.profiles
            .read()
            .expect("profile store lock poisoned")
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolProfile::unknown(name))
    }

    pub fn update(&self, profile: ToolProfile) {
        self.profiles
            .write()
            .expect("profile store lock poisoned")
            .insert(profile.name.clone(), profile);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .profiles
            .read()
            .expect("profile store lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_profiles() -> Vec<ToolProfile> {
    vec![
        ToolProfile {
            name: "web_search".to_string(),
            average_latency: Duration::from_millis(1200),
            success_rate: 0.95,
            cost_per_call: 0.005,
            cache_compatible: true,
            default_cache_ttl: Duration::from_secs(3600),
            parallel_safe: true,
            max_retries: 3,
            timeout: Duration::from_secs(15),
            complexity: 0.3,
        },
        ToolProfile {
            name: "web_fetch".to_string(),
            average_latency: Duration::from_millis(2500),
            success_rate: 0.9,
            cost_per_call: 0.0,
            cache_compatible: true,
            default_cache_ttl: Duration::from_secs(1800),
            parallel_safe: true,
            max_retries: 2,
            timeout: Duration::from_secs(30),
            complexity: 0.4,
        },
        ToolProfile {
            name: "memory_search".to_string(),
            average_latency: Duration::from_millis(300),
            success_rate: 0.99,
            cost_per_call: 0.0,
            cache_compatible: true,
            default_cache_ttl: Duration::from_secs(600),
            parallel_safe: true,
            max_retries: 1,
            timeout: Duration::from_secs(10),
            complexity: 0.2,
        },
        ToolProfile {
            name: "memory_get".to_string(),
            average_latency: Duration::from_millis(100),
            success_rate: 0.995,
            cost_per_call: 0.0,
            cache_compatible: true,
            default_cache_ttl: Duration::from_secs(600),
            parallel_safe: true,
            max_retries: 1,
            timeout: Duration::from_secs(5),
            complexity: 0.1,
        },
        ToolProfile {
            name: "read_file".to_string(),
            average_latency: Duration::from_millis(50),
            success_rate: 0.98,
            cost_per_call: 0.0,
            cache_compatible: false,
            default_cache_ttl: Duration::from_secs(60),
            parallel_safe: true,
            max_retries: 1,
            timeout: Duration::from_secs(10),
            complexity: 0.1,
        },
        ToolProfile {
            name: "write_file".to_string(),
            average_latency: Duration::from_millis(80),
            success_rate: 0.97,
            cost_per_call: 0.0,
            cache_compatible: false,
            default_cache_ttl: Duration::from_secs(0),
            parallel_safe: false,
            max_retries: 1,
            timeout: Duration::from_secs(10),
            complexity: 0.2,
        },
        ToolProfile {
            name: "exec".to_string(),
            average_latency: Duration::from_secs(5),
            success_rate: 0.85,
            cost_per_call: 0.0,
            cache_compatible: false,
            default_cache_ttl: Duration::from_secs(0),
            parallel_safe: false,
            max_retries: 1,
            timeout: Duration::from_secs(60),
            complexity: 0.7,
        },
        ToolProfile {
            name: "message".to_string(),
            average_latency: Duration::from_millis(400),
            success_rate: 0.98,
            cost_per_call: 0.0,
            cache_compatible: false,
            default_cache_ttl: Duration::from_secs(0),
            parallel_safe: true,
            max_retries: 2,
            timeout: Duration::from_secs(10),
            complexity: 0.2,
        },
    ]
}
