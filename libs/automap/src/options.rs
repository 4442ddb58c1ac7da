use std::fmt;

/// Post-processing hook: runs after field copying with the full source and destination.
pub type Hook<S, D> = Box<dyn Fn(&S, &mut D) + Send + Sync>;

/// Per-registration options for [`Mapper::auto_route`](crate::Mapper::auto_route).
///
/// ```ignore
/// mapper.auto_route::<UserRow, UserDto>(
///     AutoOptions::new()
///         .field_path("name", "display_name")
///         .exclude("password_hash")
///         .hook(|row, dto| dto.initials = initials(&row.name)),
/// )?;
/// ```
pub struct AutoOptions<S, D> {
    pub(crate) field_paths: Vec<(String, String)>,
    pub(crate) hooks: Vec<Hook<S, D>>,
    pub(crate) excluded: Vec<String>,
}

impl<S, D> Default for AutoOptions<S, D> {
    fn default() -> Self {
        Self {
            field_paths: Vec::new(),
            hooks: Vec::new(),
            excluded: Vec::new(),
        }
    }
}

impl<S, D> AutoOptions<S, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy source field `source` into destination field `dest` instead of
    /// the same-named one.
    ///
    /// The override is recorded for the source type, so it applies to every
    /// auto-route from that type, not only this one.
    pub fn field_path(mut self, source: impl Into<String>, dest: impl Into<String>) -> Self {
        self.field_paths.push((source.into(), dest.into()));
        self
    }

    /// Run `hook` after all fields are copied. Hooks run in the order added.
    pub fn hook(mut self, hook: impl Fn(&S, &mut D) + Send + Sync + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Never copy the source field at `path` (dotted for nested fields).
    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.excluded.push(path.into());
        self
    }
}

impl<S, D> fmt::Debug for AutoOptions<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoOptions")
            .field("field_paths", &self.field_paths)
            .field("hooks", &self.hooks.len())
            .field("excluded", &self.excluded)
            .finish()
    }
}
