use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::Entity;
use super::transform::Transformer;
use crate::core::{Result, Value, ValueMap};

pub type GetterFn = Arc<dyn Fn(&Entity) -> Result<Value> + Send + Sync>;
pub type SetterFn = Arc<dyn Fn(&mut Entity, Value) -> Result<()> + Send + Sync>;
pub type TriggerFn = Arc<dyn Fn(&mut Entity, &str, &Value, &Value) -> Result<()> + Send + Sync>;

/// A field that must be read through a named accessor.
#[derive(Clone)]
pub struct ForcedGetter {
    method: String,
    func: GetterFn,
}

impl ForcedGetter {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn call(&self, entity: &Entity) -> Result<Value> {
        (self.func)(entity)
    }
}

/// How `set` treats a field with a forced setter.
#[derive(Clone)]
pub enum SetterRule {
    /// `set` fails with `ForbiddenSetter`.
    Forbidden,
    /// `set` hands the (transformed) value to `func`, which is expected to
    /// store it with `Entity::assign`.
    Method { method: String, func: SetterFn },
}

/// Per-entity-type capability table: defaults, transformers, forced
/// accessors and change triggers. Built once and shared by every entity of
/// the type.
#[derive(Clone)]
pub struct ModelDefinition {
    name: String,
    defaults: ValueMap,
    transformers: HashMap<String, Vec<Transformer>>,
    getters: BTreeMap<String, ForcedGetter>,
    setters: HashMap<String, SetterRule>,
    triggers: HashMap<String, Vec<TriggerFn>>,
}

impl Default for ModelDefinition {
    fn default() -> Self {
        Self::new("Entity")
    }
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: ValueMap::new(),
            transformers: HashMap::new(),
            getters: BTreeMap::new(),
            setters: HashMap::new(),
            triggers: HashMap::new(),
        }
    }

    pub fn default_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(field, value);
        self
    }

    pub fn defaults(mut self, defaults: ValueMap) -> Self {
        self.defaults.extend(defaults);
        self
    }

    pub fn transform(mut self, field: impl Into<String>, rules: impl IntoIterator<Item = Transformer>) -> Self {
        self.transformers.entry(field.into()).or_default().extend(rules);
        self
    }

    /// Adds rules from a tag list such as `"null|trim|lower"`.
    pub fn transform_tags(self, field: impl Into<String>, tags: &str) -> Result<Self> {
        let rules = Transformer::parse_list(tags)?;
        Ok(self.transform(field, rules))
    }

    pub fn getter<F>(mut self, field: impl Into<String>, method: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Entity) -> Result<Value> + Send + Sync + 'static,
    {
        self.getters.insert(
            field.into(),
            ForcedGetter {
                method: method.into(),
                func: Arc::new(func),
            },
        );
        self
    }

    pub fn setter<F>(mut self, field: impl Into<String>, method: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Entity, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.setters.insert(
            field.into(),
            SetterRule::Method {
                method: method.into(),
                func: Arc::new(func),
            },
        );
        self
    }

    pub fn forbid_setter(mut self, field: impl Into<String>) -> Self {
        self.setters.insert(field.into(), SetterRule::Forbidden);
        self
    }

    /// Registers `func(entity, field, new, old)` to run whenever `field`
    /// records a real change.
    pub fn on_change<F>(mut self, field: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Entity, &str, &Value, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.triggers.entry(field.into()).or_default().push(Arc::new(func));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_values(&self) -> &ValueMap {
        &self.defaults
    }

    pub fn transformers(&self, field: &str) -> Option<&[Transformer]> {
        self.transformers
            .get(field)
            .map(Vec::as_slice)
            .filter(|rules| !rules.is_empty())
    }

    pub fn has_transformers(&self, field: &str) -> bool {
        self.transformers(field).is_some()
    }

    pub fn forced_getter(&self, field: &str) -> Option<&ForcedGetter> {
        self.getters.get(field)
    }

    pub fn forced_getters(&self) -> impl Iterator<Item = (&str, &ForcedGetter)> {
        self.getters.iter().map(|(field, getter)| (field.as_str(), getter))
    }

    pub fn forced_setter(&self, field: &str) -> Option<&SetterRule> {
        self.setters.get(field)
    }

    pub fn has_forced_setter(&self, field: &str) -> bool {
        self.setters.contains_key(field)
    }

    pub(crate) fn triggers(&self, field: &str) -> &[TriggerFn] {
        self.triggers.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut setters: Vec<&String> = self.setters.keys().collect();
        setters.sort();
        let mut transformers: Vec<&String> = self.transformers.keys().collect();
        transformers.sort();

        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("transformers", &transformers)
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("setters", &setters)
            .finish()
    }
}
