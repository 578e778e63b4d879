use crate::model::{
    ClusterType, DesiredState, DynamicConfig, NewProvision, ProvisionEdit, ProvisionEntity,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormField {
    #[default]
    Name,
    Containers,
    Memory,
    Cores,
}

impl FormField {
    pub const ALL: [FormField; 4] = [
        FormField::Name,
        FormField::Containers,
        FormField::Memory,
        FormField::Cores,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormField::Name => "Name",
            FormField::Containers => "Workers",
            FormField::Memory => "Memory (MB)",
            FormField::Cores => "Cores",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn numeric(self) -> bool {
        !matches!(self, FormField::Name)
    }
}

#[derive(Clone, Debug)]
pub enum FormMode {
    Create(ClusterType),
    Edit(Box<ProvisionEntity>),
}

/// What a valid form turns into.
#[derive(Clone, Debug, PartialEq)]
pub enum FormSubmit {
    Create(NewProvision),
    Edit(ProvisionEdit),
}

/// Create/edit form for one engine. Values are kept as typed text and only
/// parsed on submit.
#[derive(Clone, Debug)]
pub struct FormState {
    pub mode: FormMode,
    pub name: String,
    pub containers: String,
    pub memory_mb: String,
    pub cores: String,
    pub focused: FormField,
    pub error: Option<String>,
}

impl FormState {
    pub fn create(cluster_type: ClusterType) -> Self {
        Self {
            mode: FormMode::Create(cluster_type),
            name: String::new(),
            containers: "1".into(),
            memory_mb: "16384".into(),
            cores: "2".into(),
            focused: FormField::Name,
            error: None,
        }
    }

    pub fn edit(entity: &ProvisionEntity) -> Self {
        Self {
            name: entity.name.clone().unwrap_or_default(),
            containers: entity.dynamic_config.container_count.to_string(),
            memory_mb: entity.memory_mb.map(|v| v.to_string()).unwrap_or_default(),
            cores: entity
                .virtual_core_count
                .map(|v| v.to_string())
                .unwrap_or_default(),
            mode: FormMode::Edit(Box::new(entity.clone())),
            focused: FormField::Name,
            error: None,
        }
    }

    pub fn title(&self) -> String {
        match &self.mode {
            FormMode::Create(ct) => format!("Add {} Engine", ct.label()),
            FormMode::Edit(e) => format!("Edit {}", e.display_name()),
        }
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Containers => &self.containers,
            FormField::Memory => &self.memory_mb,
            FormField::Cores => &self.cores,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focused {
            FormField::Name => &mut self.name,
            FormField::Containers => &mut self.containers,
            FormField::Memory => &mut self.memory_mb,
            FormField::Cores => &mut self.cores,
        }
    }

    pub fn input(&mut self, c: char) {
        if self.focused.numeric() && !c.is_ascii_digit() {
            return;
        }
        if c.is_control() {
            return;
        }
        self.focused_mut().push(c);
        self.error = None;
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
        self.error = None;
    }

    /// Validate the form. Errors are ready to show to the user.
    pub fn submit(&self) -> Result<FormSubmit, String> {
        let name = Some(self.name.trim().to_string()).filter(|n| !n.is_empty());
        let container_count: u32 = self
            .containers
            .trim()
            .parse()
            .map_err(|_| "Workers must be a whole number".to_string())?;
        let memory_mb = parse_optional::<u64>(&self.memory_mb, FormField::Memory)?;
        let virtual_core_count = parse_optional::<u32>(&self.cores, FormField::Cores)?;

        match &self.mode {
            FormMode::Create(cluster_type) => {
                if container_count == 0 {
                    return Err("Workers must be at least 1".into());
                }
                Ok(FormSubmit::Create(NewProvision {
                    cluster_type: *cluster_type,
                    name,
                    desired_state: DesiredState::Running,
                    dynamic_config: DynamicConfig { container_count },
                    memory_mb,
                    virtual_core_count,
                }))
            }
            FormMode::Edit(entity) => {
                let mut data = ProvisionEdit::from_entity(entity);
                data.name = name;
                data.dynamic_config.container_count = container_count;
                data.memory_mb = memory_mb;
                data.virtual_core_count = virtual_core_count;
                Ok(FormSubmit::Edit(data))
            }
        }
    }
}

fn parse_optional<T: std::str::FromStr + PartialEq + Default>(
    raw: &str,
    field: FormField,
) -> Result<Option<T>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<T>() {
        Ok(v) if v != T::default() => Ok(Some(v)),
        _ => Err(format!("{} must be a positive number", field.label())),
    }
}
