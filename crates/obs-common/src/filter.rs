//! Allow-list filters for stations, elements and label components.
//!
//! An empty list means "no filter".

/// A caller-supplied allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList<T>(Vec<T>);

impl<T> Default for AllowList<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T: PartialEq> AllowList<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self(values)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.0
    }

    pub fn allows(&self, value: &T) -> bool {
        self.0.is_empty() || self.0.contains(value)
    }

    /// Like [`allows`](Self::allows), but an absent value always passes.
    pub fn allows_nullable(&self, value: Option<&T>) -> bool {
        value.map_or(true, |v| self.allows(v))
    }

    /// Restrict `reference` to the allowed values.
    ///
    /// Returns the retained values and the requested values that are not in
    /// `reference`, so callers can warn about them.
    pub fn select_from<'a>(&'a self, reference: Vec<T>) -> (Vec<T>, Vec<&'a T>) {
        if self.0.is_empty() {
            return (reference, Vec::new());
        }
        let missing = self.0.iter().filter(|v| !reference.contains(v)).collect();
        let kept = reference.into_iter().filter(|v| self.0.contains(v)).collect();
        (kept, missing)
    }
}

impl<T> From<Vec<T>> for AllowList<T> {
    fn from(values: Vec<T>) -> Self {
        Self(values)
    }
}

/// Filter over the five label components.
#[derive(Debug, Clone, Default)]
pub struct LabelFilter {
    pub stations: AllowList<i32>,
    pub types: AllowList<i32>,
    pub params: AllowList<i32>,
    pub sensors: AllowList<i32>,
    pub levels: AllowList<i32>,
}

impl LabelFilter {
    pub fn allows(&self, label: &crate::Label) -> bool {
        self.stations.allows(&label.station_id)
            && self.types.allows(&label.type_id)
            && self.params.allows(&label.param_id)
            && self.sensors.allows_nullable(label.sensor.as_ref())
            && self.levels.allows_nullable(label.level.as_ref())
    }
}
