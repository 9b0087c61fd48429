//! Koppelt parameterwaarden aan declaraties en kopieert ze per vlak in
//! buffers van de juiste grootte.

use std::collections::BTreeMap;

use serde::Serialize;

use super::counts::ValueCounts;
use crate::scene::{
    BasicType, DeclarationDictionary, ErrorKind, RiError, StorageClass, TokenValue, TypeKind,
    Values,
};

/// Eén gebonden primitieve variabele: declaratie plus alle waarden.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundVar {
    pub name: String,
    pub class: StorageClass,
    pub kind: TypeKind,
    /// Waarden per element.
    pub width: usize,
    pub values: Values,
}

impl BoundVar {
    /// Aantal elementen.
    #[must_use]
    pub fn count(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    /// Letterlijke kopie; voor constante variabelen.
    #[must_use]
    pub fn constant(&self) -> Values {
        self.values.slice(0, self.width)
    }

    /// Het `face`-de element.
    #[must_use]
    pub fn uniform(&self, face: usize) -> Values {
        if face >= self.count() {
            return self.values.empty_like();
        }
        self.values.slice(face * self.width, self.width)
    }

    /// Eén element per index, in volgorde; dubbele indices worden los
    /// gekopieerd. Indices buiten bereik worden overgeslagen.
    #[must_use]
    pub fn gather(&self, indices: &[usize]) -> Values {
        let mut out = self.values.empty_like();
        let count = self.count();
        for &index in indices {
            if index < count {
                out.extend_from(&self.values.slice(index * self.width, self.width));
            }
        }
        out
    }

    /// Aaneengesloten elementen `[offset, offset + count)`.
    #[must_use]
    pub fn range(&self, offset: usize, count: usize) -> Values {
        let available = self.count().saturating_sub(offset);
        self.values
            .slice(offset * self.width, count.min(available) * self.width)
    }

    /// Waarden als `f64`, voor interpolatie.
    #[must_use]
    pub fn floats(&self) -> Vec<f64> {
        match &self.values {
            Values::Floats(v) => v.iter().map(|&f| f64::from(f)).collect(),
            Values::Integers(v) => v.iter().map(|&i| f64::from(i)).collect(),
            Values::Strings(_) => Vec::new(),
        }
    }
}

/// Hoe de variabelen van één vlak uit de primitief geselecteerd worden.
#[derive(Debug, Clone, Copy)]
pub struct FaceSelection<'a> {
    /// Index voor uniform-variabelen.
    pub uniform: usize,
    /// Indices in de varying-waarden.
    pub varying: &'a [usize],
    /// Indices in de vertex-waarden.
    pub vertex: &'a [usize],
    /// Eerste facevarying-element en aantal.
    pub facevarying: (usize, usize),
    /// Eerste facevertex-element en aantal.
    pub facevertex: (usize, usize),
}

/// Alle gebonden variabelen van een primitief, op naam.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimVars {
    vars: BTreeMap<String, BoundVar>,
}

impl PrimVars {
    /// Koppelt elk token aan zijn declaratie en controleert het aantal
    /// waarden tegen `counts`. Eén fout wijst de hele primitief af.
    pub fn bind(
        dict: &mut DeclarationDictionary,
        list: &[TokenValue<'_>],
        counts: &ValueCounts,
    ) -> Result<Self, RiError> {
        let mut vars = BTreeMap::new();
        for pair in list {
            let id = dict.resolve(pair.token)?;
            let width = dict.width(id);
            let decl = dict.get(id);
            let expected = counts.get(decl.class) * width;
            let values = coerce(&pair.value.values, decl.basic_type()).ok_or_else(|| {
                RiError::new(
                    ErrorKind::Consistency,
                    format!(
                        "parameter \"{}\" expects {} values, found {}",
                        decl.name,
                        decl.basic_type().name(),
                        pair.value.basic_type().name()
                    ),
                )
            })?;
            if values.len() != expected {
                return Err(RiError::new(
                    ErrorKind::Consistency,
                    format!(
                        "parameter \"{}\" ({} {}) needs {expected} values, found {}",
                        decl.name,
                        decl.class.name(),
                        decl.kind.name(),
                        values.len()
                    ),
                ));
            }
            vars.insert(
                decl.name.clone(),
                BoundVar {
                    name: decl.name.clone(),
                    class: decl.class,
                    kind: decl.kind,
                    width,
                    values,
                },
            );
        }
        Ok(Self { vars })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundVar> {
        self.vars.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundVar> {
        self.vars.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// De variabelen van één vlak; elk element van de juiste klasse wordt
    /// volgens `selection` gekopieerd.
    #[must_use]
    pub fn select(&self, selection: &FaceSelection<'_>) -> PrimVars {
        let vars = self
            .vars
            .iter()
            .map(|(name, var)| {
                let values = match var.class {
                    StorageClass::Constant => var.constant(),
                    StorageClass::Uniform => var.uniform(selection.uniform),
                    StorageClass::Varying => var.gather(selection.varying),
                    StorageClass::Vertex => var.gather(selection.vertex),
                    StorageClass::FaceVarying => {
                        var.range(selection.facevarying.0, selection.facevarying.1)
                    }
                    StorageClass::FaceVertex => {
                        var.range(selection.facevertex.0, selection.facevertex.1)
                    }
                };
                let bound = BoundVar {
                    values,
                    ..var.clone_header()
                };
                (name.clone(), bound)
            })
            .collect();
        PrimVars { vars }
    }
}

impl BoundVar {
    fn clone_header(&self) -> BoundVar {
        BoundVar {
            name: self.name.clone(),
            class: self.class,
            kind: self.kind,
            width: self.width,
            values: self.values.empty_like(),
        }
    }
}

/// Zet waarden om naar het gedeclareerde basistype; gehele getallen worden
/// floats, het omgekeerde alleen voor gehele floatwaarden.
fn coerce(values: &Values, target: BasicType) -> Option<Values> {
    match target {
        BasicType::Float => values.to_floats().map(Values::Floats),
        BasicType::Integer => values.to_integers().map(Values::Integers),
        BasicType::String => match values {
            Values::Strings(_) => Some(values.clone()),
            other if other.is_empty() => Some(Values::Strings(Vec::new())),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Parameter, RequestKind, param::split_token_list};
    use crate::vars::counts;

    fn bind(dict: &mut DeclarationDictionary, params: &[Parameter], counts: &ValueCounts) -> Result<PrimVars, RiError> {
        let list = split_token_list(RequestKind::PointsPolygons, params)?;
        PrimVars::bind(dict, &list, counts)
    }

    #[test]
    fn declared_uniform_binds_one_value_per_face() {
        let mut dict = DeclarationDictionary::with_defaults();
        dict.declare("foo", "uniform float").unwrap();
        let counts = counts::points_polygons(&[3, 3, 3], &[0, 1, 2, 0, 2, 3, 0, 3, 1]);
        let params = vec![
            Parameter::string("P"),
            Parameter::floats(vec![0.0; 12]),
            Parameter::string("foo"),
            Parameter::floats(vec![1.0, 2.0, 3.0]),
        ];
        let vars = bind(&mut dict, &params, &counts).unwrap();
        let foo = vars.get("foo").unwrap();
        assert_eq!(foo.values, Values::Floats(vec![1.0, 2.0, 3.0]));
        assert_eq!(foo.uniform(1), Values::Floats(vec![2.0]));
    }

    #[test]
    fn wrong_value_count_rejects_the_primitive() {
        let mut dict = DeclarationDictionary::with_defaults();
        let params = vec![Parameter::string("P"), Parameter::floats(vec![0.0; 8])];
        let err = bind(&mut dict, &params, &counts::polygon(3)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Consistency);
    }

    #[test]
    fn integer_values_are_promoted_for_float_declarations() {
        let mut dict = DeclarationDictionary::with_defaults();
        let params = vec![Parameter::string("s"), Parameter::ints(vec![0, 1, 2])];
        let vars = bind(&mut dict, &params, &counts::polygon(3)).unwrap();
        assert_eq!(vars.get("s").unwrap().values, Values::Floats(vec![0.0, 1.0, 2.0]));
    }

    #[test]
    fn gather_copies_duplicates_independently() {
        let var = BoundVar {
            name: "Cs".into(),
            class: StorageClass::Varying,
            kind: TypeKind::Color,
            width: 3,
            values: Values::Floats(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
        };
        assert_eq!(
            var.gather(&[1, 0, 1]),
            Values::Floats(vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0])
        );
        assert_eq!(var.gather(&[7]), Values::Floats(vec![]));
        assert_eq!(var.range(1, 5), Values::Floats(vec![1.0, 1.0, 1.0]));
    }

    #[test]
    fn select_picks_per_class_values() {
        let mut dict = DeclarationDictionary::with_defaults();
        let counts = counts::points_polygons(&[3, 3], &[0, 1, 2, 2, 1, 3]);
        let params = vec![
            Parameter::string("P"),
            Parameter::floats((0..12).map(|i| i as f32).collect()),
            Parameter::string("facevarying float fv"),
            Parameter::floats(vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]),
        ];
        let vars = bind(&mut dict, &params, &counts).unwrap();
        let face = vars.select(&FaceSelection {
            uniform: 1,
            varying: &[2, 1, 3],
            vertex: &[2, 1, 3],
            facevarying: (3, 3),
            facevertex: (3, 3),
        });
        assert_eq!(face.get("fv").unwrap().values, Values::Floats(vec![13.0, 14.0, 15.0]));
        assert_eq!(
            face.get("P").unwrap().values,
            Values::Floats(vec![6.0, 7.0, 8.0, 3.0, 4.0, 5.0, 9.0, 10.0, 11.0])
        );
    }
}
