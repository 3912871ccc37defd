//! In-memory label tree.
//!
//! A [`Container`] holds an ordered list of [`Node`]s: keywords, groups and
//! objects. Names are matched case-insensitively. Lookups return
//! `Err(CubeError::NotFound)` on a miss.

use cube_common::{CubeError, Result};

/// One keyword value, kept as text with an optional unit.
#[derive(Debug, Clone)]
pub struct Value {
    pub text: String,
    pub unit: Option<String>,
    /// Whether the value was quoted in its source text.
    pub quoted: bool,
}

impl Value {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            unit: None,
            quoted: false,
        }
    }

    pub fn with_unit(text: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            unit: Some(unit.into()),
            quoted: false,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            unit: None,
            quoted: true,
        }
    }
}

// Quoting is a presentation detail and does not take part in equality.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.unit == other.unit
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::new(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::new(s)
    }
}

/// A named keyword with zero or more values and attached comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: String,
    pub values: Vec<Value>,
    pub comments: Vec<String>,
}

impl Keyword {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
            comments: Vec::new(),
        }
    }

    pub fn with_unit(name: impl Into<String>, value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![Value::with_unit(value, unit)],
            comments: Vec::new(),
        }
    }

    pub fn array<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            comments: Vec::new(),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Text of the `i`-th value.
    pub fn value(&self, i: usize) -> Result<&str> {
        self.values
            .get(i)
            .map(|v| v.text.as_str())
            .ok_or_else(|| CubeError::not_found(format!("keyword {} has no value {}", self.name, i)))
    }

    /// Unit of the `i`-th value, if any.
    pub fn unit(&self, i: usize) -> Result<Option<&str>> {
        self.values
            .get(i)
            .map(|v| v.unit.as_deref())
            .ok_or_else(|| CubeError::not_found(format!("keyword {} has no value {}", self.name, i)))
    }

    /// First value as text.
    pub fn text(&self) -> Result<&str> {
        self.value(0)
    }

    pub fn as_f64(&self, i: usize) -> Result<f64> {
        let text = self.value(i)?;
        text.trim().parse().map_err(|_| {
            CubeError::parse(format!("keyword {} value '{}' is not a number", self.name, text))
        })
    }

    pub fn as_i64(&self, i: usize) -> Result<i64> {
        let text = self.value(i)?;
        let trimmed = text.trim();
        trimmed
            .parse::<i64>()
            .or_else(|_| trimmed.parse::<f64>().map(|f| f as i64))
            .map_err(|_| CubeError::parse(format!("keyword {} value '{}' is not an integer", self.name, text)))
    }

    /// Set the `i`-th value. Setting one past the end appends.
    pub fn set_value(&mut self, i: usize, text: impl Into<String>, unit: Option<&str>) -> Result<()> {
        let value = Value {
            text: text.into(),
            unit: unit.map(str::to_string),
            quoted: false,
        };
        match i.cmp(&self.values.len()) {
            std::cmp::Ordering::Less => {
                self.values[i] = value;
                Ok(())
            }
            std::cmp::Ordering::Equal => {
                self.values.push(value);
                Ok(())
            }
            std::cmp::Ordering::Greater => Err(CubeError::bad_argument(format!(
                "value index {} beyond the {} values of {}",
                i,
                self.values.len(),
                self.name
            ))),
        }
    }

    pub fn add_value(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }
}

/// How far a lookup descends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traverse {
    CurrentLevel,
    DepthFirst,
}

/// A child of a container.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Keyword(Keyword),
    Group(Container),
    Object(Container),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Want {
    Group,
    Object,
    Either,
}

impl Node {
    fn container(&self, want: Want) -> Option<&Container> {
        match (self, want) {
            (Node::Group(c), Want::Group | Want::Either) => Some(c),
            (Node::Object(c), Want::Object | Want::Either) => Some(c),
            _ => None,
        }
    }

    fn any_container(&self) -> Option<&Container> {
        self.container(Want::Either)
    }

    fn any_container_mut(&mut self) -> Option<&mut Container> {
        match self {
            Node::Group(c) | Node::Object(c) => Some(c),
            Node::Keyword(_) => None,
        }
    }
}

/// A named, ordered collection of keywords, groups and objects. The root of
/// a label is a container too.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    pub name: String,
    pub comments: Vec<String>,
    children: Vec<Node>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comments: Vec::new(),
            children: Vec::new(),
        }
    }

    /// An unnamed root container.
    pub fn root() -> Self {
        Self::new("Root")
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    // ========================================================================
    // Keywords
    // ========================================================================

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.children.iter().filter_map(|n| match n {
            Node::Keyword(k) => Some(k),
            _ => None,
        })
    }

    pub fn add_keyword(&mut self, keyword: Keyword) {
        self.children.push(Node::Keyword(keyword));
    }

    /// Replace the current-level keyword with the same name, or append.
    pub fn set_keyword(&mut self, keyword: Keyword) {
        for node in self.children.iter_mut() {
            if let Node::Keyword(k) = node {
                if k.is_named(&keyword.name) {
                    *k = keyword;
                    return;
                }
            }
        }
        self.add_keyword(keyword);
    }

    pub fn has_keyword(&self, name: &str, traverse: Traverse) -> bool {
        self.keyword(name, traverse).is_ok()
    }

    /// Find a keyword. Depth-first search checks this level before
    /// descending into groups and objects in order.
    pub fn keyword(&self, name: &str, traverse: Traverse) -> Result<&Keyword> {
        self.find_keyword(name, traverse)
            .ok_or_else(|| CubeError::not_found(format!("keyword {} not found in {}", name, self.name)))
    }

    fn find_keyword(&self, name: &str, traverse: Traverse) -> Option<&Keyword> {
        if let Some(k) = self.keywords().find(|k| k.is_named(name)) {
            return Some(k);
        }
        if traverse == Traverse::DepthFirst {
            for child in self.children.iter().filter_map(Node::any_container) {
                if let Some(k) = child.find_keyword(name, traverse) {
                    return Some(k);
                }
            }
        }
        None
    }

    pub fn keyword_mut(&mut self, name: &str, traverse: Traverse) -> Result<&mut Keyword> {
        let path = self
            .keyword_path(name, traverse)
            .ok_or_else(|| CubeError::not_found(format!("keyword {} not found in {}", name, self.name)))?;
        let (last, containers) = path.split_last().ok_or_else(|| CubeError::not_found(name.to_string()))?;
        let holder = self.walk_mut(containers);
        match &mut holder.children[*last] {
            Node::Keyword(k) => Ok(k),
            _ => Err(CubeError::not_found(format!("keyword {name}"))),
        }
    }

    fn keyword_path(&self, name: &str, traverse: Traverse) -> Option<Vec<usize>> {
        if let Some(i) = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Keyword(k) if k.is_named(name)))
        {
            return Some(vec![i]);
        }
        if traverse == Traverse::DepthFirst {
            for (i, node) in self.children.iter().enumerate() {
                if let Some(c) = node.any_container() {
                    if let Some(mut rest) = c.keyword_path(name, traverse) {
                        rest.insert(0, i);
                        return Some(rest);
                    }
                }
            }
        }
        None
    }

    /// Shorthand for the first value of a keyword.
    pub fn keyword_value(&self, name: &str, traverse: Traverse) -> Result<&str> {
        self.keyword(name, traverse)?.value(0)
    }

    /// Delete a current-level keyword.
    pub fn delete_keyword(&mut self, name: &str) -> Result<Keyword> {
        let i = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Keyword(k) if k.is_named(name)))
            .ok_or_else(|| CubeError::not_found(format!("keyword {} not found in {}", name, self.name)))?;
        match self.children.remove(i) {
            Node::Keyword(k) => Ok(k),
            _ => Err(CubeError::not_found(format!("keyword {name}"))),
        }
    }

    // ========================================================================
    // Groups and objects
    // ========================================================================

    pub fn groups(&self) -> impl Iterator<Item = &Container> {
        self.children.iter().filter_map(|n| n.container(Want::Group))
    }

    pub fn objects(&self) -> impl Iterator<Item = &Container> {
        self.children.iter().filter_map(|n| n.container(Want::Object))
    }

    /// Every current-level object with the given name, in order.
    pub fn objects_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Container> + 'a {
        self.objects().filter(move |o| o.is_named(name))
    }

    pub fn add_group(&mut self, group: Container) {
        self.children.push(Node::Group(group));
    }

    pub fn add_object(&mut self, object: Container) {
        self.children.push(Node::Object(object));
    }

    /// Replace the current-level group with the same name, or append.
    pub fn set_group(&mut self, group: Container) {
        for node in self.children.iter_mut() {
            if let Node::Group(g) = node {
                if g.is_named(&group.name) {
                    *g = group;
                    return;
                }
            }
        }
        self.add_group(group);
    }

    pub fn has_group(&self, name: &str, traverse: Traverse) -> bool {
        self.container_path(name, Want::Group, traverse).is_some()
    }

    pub fn has_object(&self, name: &str, traverse: Traverse) -> bool {
        self.container_path(name, Want::Object, traverse).is_some()
    }

    pub fn group(&self, name: &str, traverse: Traverse) -> Result<&Container> {
        self.find(name, Want::Group, traverse)
            .ok_or_else(|| CubeError::not_found(format!("group {} not found in {}", name, self.name)))
    }

    pub fn object(&self, name: &str, traverse: Traverse) -> Result<&Container> {
        self.find(name, Want::Object, traverse)
            .ok_or_else(|| CubeError::not_found(format!("object {} not found in {}", name, self.name)))
    }

    pub fn group_mut(&mut self, name: &str, traverse: Traverse) -> Result<&mut Container> {
        let path = self
            .container_path(name, Want::Group, traverse)
            .ok_or_else(|| CubeError::not_found(format!("group {} not found in {}", name, self.name)))?;
        Ok(self.walk_mut(&path))
    }

    pub fn object_mut(&mut self, name: &str, traverse: Traverse) -> Result<&mut Container> {
        let path = self
            .container_path(name, Want::Object, traverse)
            .ok_or_else(|| CubeError::not_found(format!("object {} not found in {}", name, self.name)))?;
        Ok(self.walk_mut(&path))
    }

    pub fn delete_group(&mut self, name: &str) -> Result<Container> {
        self.delete_container(name, Want::Group)
    }

    pub fn delete_object(&mut self, name: &str) -> Result<Container> {
        self.delete_container(name, Want::Object)
    }

    fn delete_container(&mut self, name: &str, want: Want) -> Result<Container> {
        let i = self
            .children
            .iter()
            .position(|n| n.container(want).map_or(false, |c| c.is_named(name)))
            .ok_or_else(|| CubeError::not_found(format!("{} not found in {}", name, self.name)))?;
        match self.children.remove(i) {
            Node::Group(c) | Node::Object(c) => Ok(c),
            Node::Keyword(_) => Err(CubeError::not_found(name.to_string())),
        }
    }

    fn find(&self, name: &str, want: Want, traverse: Traverse) -> Option<&Container> {
        for node in &self.children {
            if let Some(c) = node.container(want) {
                if c.is_named(name) {
                    return Some(c);
                }
            }
        }
        if traverse == Traverse::DepthFirst {
            for child in self.children.iter().filter_map(Node::any_container) {
                if let Some(c) = child.find(name, want, traverse) {
                    return Some(c);
                }
            }
        }
        None
    }

    fn container_path(&self, name: &str, want: Want, traverse: Traverse) -> Option<Vec<usize>> {
        if let Some(i) = self
            .children
            .iter()
            .position(|n| n.container(want).map_or(false, |c| c.is_named(name)))
        {
            return Some(vec![i]);
        }
        if traverse == Traverse::DepthFirst {
            for (i, node) in self.children.iter().enumerate() {
                if let Some(c) = node.any_container() {
                    if let Some(mut rest) = c.container_path(name, want, traverse) {
                        rest.insert(0, i);
                        return Some(rest);
                    }
                }
            }
        }
        None
    }

    fn walk_mut(&mut self, path: &[usize]) -> &mut Container {
        let mut current = self;
        for &i in path {
            // Paths are produced by container_path/keyword_path on this tree.
            current = match current.children[i].any_container_mut() {
                Some(c) => c,
                None => unreachable!("label path step {} is not a container", i),
            };
        }
        current
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Merge `other`'s children into this container: keywords replace
    /// same-named keywords, groups and objects merge with same-named
    /// siblings of the same kind or are appended.
    pub fn merge_from(&mut self, other: &Container) {
        for node in &other.children {
            match node {
                Node::Keyword(k) => self.set_keyword(k.clone()),
                Node::Group(g) => match self.group_mut(&g.name, Traverse::CurrentLevel) {
                    Ok(existing) => existing.merge_from(g),
                    Err(_) => self.add_group(g.clone()),
                },
                Node::Object(o) => match self.object_mut(&o.name, Traverse::CurrentLevel) {
                    Ok(existing) => existing.merge_from(o),
                    Err(_) => self.add_object(o.clone()),
                },
            }
        }
    }

    /// Merge `other` into the group or object named `target`, found
    /// depth-first.
    pub fn merge_into(&mut self, target: &str, other: &Container) -> Result<()> {
        let path = self
            .container_path(target, Want::Either, Traverse::DepthFirst)
            .ok_or_else(|| CubeError::not_found(format!("merge target {} not found in {}", target, self.name)))?;
        self.walk_mut(&path).merge_from(other);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::ErrorKind;

    fn sample() -> Container {
        let mut dims = Container::new("Dimensions");
        dims.add_keyword(Keyword::new("Samples", "32"));
        dims.add_keyword(Keyword::new("Lines", "16"));

        let mut core = Container::new("Core");
        core.add_keyword(Keyword::new("StartByte", "65537"));
        core.add_group(dims);

        let mut cube = Container::new("IsisCube");
        cube.add_object(core);

        let mut root = Container::root();
        root.add_object(cube);
        root
    }

    #[test]
    fn test_depth_first_lookup() {
        let root = sample();
        assert_eq!(root.keyword("samples", Traverse::DepthFirst).unwrap().value(0).unwrap(), "32");
        let err = root.keyword("Samples", Traverse::CurrentLevel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(root.has_group("DIMENSIONS", Traverse::DepthFirst));
        assert!(root.object("Core", Traverse::CurrentLevel).is_err());
    }

    #[test]
    fn test_mutation_through_lookup() {
        let mut root = sample();
        root.keyword_mut("Lines", Traverse::DepthFirst)
            .unwrap()
            .set_value(0, "20", None)
            .unwrap();
        assert_eq!(root.keyword_value("Lines", Traverse::DepthFirst).unwrap(), "20");

        let group = root.group_mut("Dimensions", Traverse::DepthFirst).unwrap();
        group.add_keyword(Keyword::new("Bands", "3"));
        assert_eq!(group.delete_keyword("samples").unwrap().name, "Samples");
        assert!(group.delete_keyword("samples").is_err());
    }

    #[test]
    fn test_values_units_comments() {
        let mut k = Keyword::with_unit("ExposureDuration", "1.5", "ms");
        k.add_comment("shutter open time");
        k.set_value(1, "2.0", Some("ms")).unwrap();
        assert_eq!(k.len(), 2);
        assert_eq!(k.unit(1).unwrap(), Some("ms"));
        assert_eq!(k.as_f64(0).unwrap(), 1.5);
        assert_eq!(k.set_value(5, "x", None).unwrap_err().kind(), ErrorKind::BadArgument);
        assert_eq!(k.value(9).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_merge_into_named_object() {
        let mut root = sample();
        let mut extra = Container::new("Patch");
        extra.add_keyword(Keyword::new("StartByte", "1"));
        let mut pixels = Container::new("Pixels");
        pixels.add_keyword(Keyword::new("Type", "Real"));
        extra.add_group(pixels);

        root.merge_into("Core", &extra).unwrap();
        let core = root.object("Core", Traverse::DepthFirst).unwrap();
        assert_eq!(core.keyword_value("StartByte", Traverse::CurrentLevel).unwrap(), "1");
        assert_eq!(core.groups().count(), 2);
        assert!(root.merge_into("Nope", &extra).is_err());
    }
}
