//! Cache invalidation rules.
//!
//! When an operation reaches the server, cached reads of the resources it
//! touched are stale. A resource is affected when its name occurs anywhere
//! in the operation's endpoint, so `/teachers/3/reviews` invalidates both
//! `teachers` and `reviews`.

/// Resource namespaces known out of the box.
pub const DEFAULT_RESOURCES: [&str; 4] = ["teachers", "appointments", "users", "reviews"];

/// The extensible set of resource namespaces subject to invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRules {
    resources: Vec<String>,
}

impl InvalidationRules {
    /// Create rules from a list of resource names. Empty names and
    /// duplicates are dropped.
    pub fn new<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rules = Self { resources: vec![] };
        for resource in resources {
            rules.add(resource);
        }
        rules
    }

    /// Add a resource name.
    pub fn add(&mut self, resource: impl Into<String>) {
        let resource = resource.into();
        if !resource.is_empty() && !self.resources.contains(&resource) {
            self.resources.push(resource);
        }
    }

    /// Builder-style [`add`](Self::add).
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.add(resource);
        self
    }

    /// Resource names whose caches an operation on `endpoint` invalidates.
    pub fn affected<'a>(&'a self, endpoint: &str) -> Vec<&'a str> {
        self.resources
            .iter()
            .filter(|resource| endpoint.contains(resource.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// All known resource names.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }
}

impl Default for InvalidationRules {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCES)
    }
}
