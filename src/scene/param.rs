//! Parameterwaarden en hulpmiddelen om positionele argumenten en
//! token/waarde-lijsten uit een request te halen.

use serde::Serialize;

use super::error::{ErrorKind, RiError};
use super::request::RequestKind;

/// Basistype van een waarde zoals die in de stroom stond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BasicType {
    Integer,
    Float,
    String,
}

impl BasicType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
        }
    }
}

/// Getypeerde waardenreeks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Values {
    Integers(Vec<i32>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
}

impl Values {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Integers(v) => v.len(),
            Self::Floats(v) => v.len(),
            Self::Strings(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn basic_type(&self) -> BasicType {
        match self {
            Self::Integers(_) => BasicType::Integer,
            Self::Floats(_) => BasicType::Float,
            Self::Strings(_) => BasicType::String,
        }
    }

    /// Lege reeks van hetzelfde type.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        match self {
            Self::Integers(_) => Self::Integers(Vec::new()),
            Self::Floats(_) => Self::Floats(Vec::new()),
            Self::Strings(_) => Self::Strings(Vec::new()),
        }
    }

    /// Kopie van `[start, start + len)`, afgekapt op de werkelijke lengte.
    #[must_use]
    pub fn slice(&self, start: usize, len: usize) -> Self {
        fn take<T: Clone>(v: &[T], start: usize, len: usize) -> Vec<T> {
            let start = start.min(v.len());
            let end = start.saturating_add(len).min(v.len());
            v[start..end].to_vec()
        }
        match self {
            Self::Integers(v) => Self::Integers(take(v, start, len)),
            Self::Floats(v) => Self::Floats(take(v, start, len)),
            Self::Strings(v) => Self::Strings(take(v, start, len)),
        }
    }

    /// Voegt `other` achteraan toe als het type overeenkomt.
    pub fn extend_from(&mut self, other: &Values) -> bool {
        match (self, other) {
            (Self::Integers(a), Self::Integers(b)) => a.extend_from_slice(b),
            (Self::Floats(a), Self::Floats(b)) => a.extend_from_slice(b),
            (Self::Strings(a), Self::Strings(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }

    /// Numerieke waarden als `f32`; strings leveren `None`.
    #[must_use]
    pub fn to_floats(&self) -> Option<Vec<f32>> {
        match self {
            Self::Integers(v) => Some(v.iter().map(|&i| i as f32).collect()),
            Self::Floats(v) => Some(v.clone()),
            Self::Strings(v) if v.is_empty() => Some(Vec::new()),
            Self::Strings(_) => None,
        }
    }

    /// Gehele waarden; een lege reeks van elk type telt als leeg.
    #[must_use]
    pub fn to_integers(&self) -> Option<Vec<i32>> {
        match self {
            Self::Integers(v) => Some(v.clone()),
            Self::Floats(v) if v.iter().all(|f| f.fract() == 0.0) => {
                Some(v.iter().map(|&f| f as i32).collect())
            }
            Self::Strings(v) if v.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }
}

/// Eén parameter van een request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub values: Values,
    /// `false` voor een losse scalar, `true` voor een `[ ]`-array.
    pub is_array: bool,
    /// Type van het eerste element zoals het gelezen werd; kan afwijken van
    /// `values` wanneer gehele getallen naar floats gepromoveerd zijn.
    pub source_type: BasicType,
}

impl Parameter {
    #[must_use]
    pub fn new(values: Values, is_array: bool) -> Self {
        let source_type = values.basic_type();
        Self {
            values,
            is_array,
            source_type,
        }
    }

    #[must_use]
    pub fn int(value: i32) -> Self {
        Self::new(Values::Integers(vec![value]), false)
    }

    #[must_use]
    pub fn float(value: f32) -> Self {
        Self::new(Values::Floats(vec![value]), false)
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(Values::Strings(vec![value.into()]), false)
    }

    #[must_use]
    pub fn ints(values: Vec<i32>) -> Self {
        Self::new(Values::Integers(values), true)
    }

    #[must_use]
    pub fn floats(values: Vec<f32>) -> Self {
        Self::new(Values::Floats(values), true)
    }

    #[must_use]
    pub fn strings(values: Vec<String>) -> Self {
        Self::new(Values::Strings(values), true)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn basic_type(&self) -> BasicType {
        self.values.basic_type()
    }

    /// Enkele string (scalar of array met één element).
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.values {
            Values::Strings(v) if v.len() == 1 => Some(v[0].as_str()),
            _ => None,
        }
    }
}

/// Haalt positionele argumenten één voor één uit een parameterreeks.
///
/// Numerieke argumenten mogen los of verpakt in een array staan; `float`
/// loopt door array-elementen heen zodat `Translate 1 2 3` en
/// `Translate [1 2 3]` hetzelfde opleveren.
#[derive(Debug)]
pub struct Args<'a> {
    kind: RequestKind,
    params: &'a [Parameter],
    pos: usize,
    offset: usize,
}

impl<'a> Args<'a> {
    #[must_use]
    pub fn new(kind: RequestKind, params: &'a [Parameter]) -> Self {
        Self {
            kind,
            params,
            pos: 0,
            offset: 0,
        }
    }

    fn missing(&self, what: &str) -> RiError {
        RiError::new(
            ErrorKind::MissingData,
            format!("{}: missing {what} argument", self.kind.name()),
        )
    }

    fn wrong_type(&self, what: &str, found: BasicType) -> RiError {
        RiError::new(
            ErrorKind::Consistency,
            format!(
                "{}: expected {what} argument, found {}",
                self.kind.name(),
                found.name()
            ),
        )
    }

    fn current(&self) -> Option<&'a Parameter> {
        self.params.get(self.pos)
    }

    fn advance_whole(&mut self) {
        self.pos += 1;
        self.offset = 0;
    }

    /// Type van het volgende argument, zonder het te verbruiken.
    #[must_use]
    pub fn peek_type(&self) -> Option<BasicType> {
        self.current().map(Parameter::basic_type)
    }

    /// Volgende parameter, zonder hem te verbruiken.
    #[must_use]
    pub fn peek(&self) -> Option<&'a Parameter> {
        self.current()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.pos >= self.params.len()
    }

    pub fn float(&mut self) -> Result<f32, RiError> {
        let param = self.current().ok_or_else(|| self.missing("float"))?;
        let value = match &param.values {
            Values::Floats(v) => v.get(self.offset).copied(),
            Values::Integers(v) => v.get(self.offset).map(|&i| i as f32),
            Values::Strings(_) => return Err(self.wrong_type("float", BasicType::String)),
        };
        let value = value.ok_or_else(|| self.missing("float"))?;
        self.offset += 1;
        if self.offset >= param.len() {
            self.advance_whole();
        }
        Ok(value)
    }

    pub fn floats<const N: usize>(&mut self) -> Result<[f32; N], RiError> {
        let mut out = [0.0; N];
        for slot in &mut out {
            *slot = self.float()?;
        }
        Ok(out)
    }

    /// `count` losse of verpakte floats.
    pub fn float_vec(&mut self, count: usize) -> Result<Vec<f32>, RiError> {
        (0..count).map(|_| self.float()).collect()
    }

    /// Volgende integer; een float telt alleen als hij geheel is.
    pub fn int(&mut self) -> Result<i32, RiError> {
        let param = self.current().ok_or_else(|| self.missing("integer"))?;
        let value = match &param.values {
            Values::Integers(v) => v.get(self.offset).copied(),
            Values::Floats(v) => match v.get(self.offset) {
                Some(&f) if f.fract() == 0.0 && f >= i32::MIN as f32 && f < i32::MAX as f32 => {
                    Some(f as i32)
                }
                Some(&f) => {
                    return Err(RiError::new(
                        ErrorKind::Consistency,
                        format!("{}: expected integer argument, found {f}", self.kind.name()),
                    ));
                }
                None => None,
            },
            Values::Strings(_) => return Err(self.wrong_type("integer", BasicType::String)),
        };
        let value = value.ok_or_else(|| self.missing("integer"))?;
        self.offset += 1;
        if self.offset >= param.len() {
            self.advance_whole();
        }
        Ok(value)
    }

    /// Volledige volgende parameter als float-array.
    pub fn float_array(&mut self) -> Result<Vec<f32>, RiError> {
        self.require_boundary()?;
        let param = self.current().ok_or_else(|| self.missing("float array"))?;
        let values = param
            .values
            .to_floats()
            .ok_or_else(|| self.wrong_type("float array", param.basic_type()))?;
        self.advance_whole();
        Ok(values)
    }

    /// Volledige volgende parameter als integer-array.
    pub fn int_array(&mut self) -> Result<Vec<i32>, RiError> {
        self.require_boundary()?;
        let param = self.current().ok_or_else(|| self.missing("integer array"))?;
        let values = param
            .values
            .to_integers()
            .ok_or_else(|| self.wrong_type("integer array", param.basic_type()))?;
        self.advance_whole();
        Ok(values)
    }

    /// Niet-negatieve integer-array, bijvoorbeeld vertex-aantallen of indices.
    pub fn count_array(&mut self) -> Result<Vec<usize>, RiError> {
        let values = self.int_array()?;
        values
            .into_iter()
            .map(|v| {
                usize::try_from(v).map_err(|_| {
                    RiError::new(
                        ErrorKind::Range,
                        format!("{}: negative count or index {v}", self.kind.name()),
                    )
                })
            })
            .collect()
    }

    pub fn string(&mut self) -> Result<&'a str, RiError> {
        self.require_boundary()?;
        let param = self.current().ok_or_else(|| self.missing("string"))?;
        let value = param
            .as_str()
            .ok_or_else(|| self.wrong_type("string", param.basic_type()))?;
        self.advance_whole();
        Ok(value)
    }

    /// Volledige volgende parameter als string-array.
    pub fn string_array(&mut self) -> Result<Vec<String>, RiError> {
        self.require_boundary()?;
        let param = self.current().ok_or_else(|| self.missing("string array"))?;
        let values = match &param.values {
            Values::Strings(v) => v.clone(),
            other if other.is_empty() => Vec::new(),
            _ => return Err(self.wrong_type("string array", param.basic_type())),
        };
        self.advance_whole();
        Ok(values)
    }

    fn require_boundary(&self) -> Result<(), RiError> {
        if self.offset != 0 {
            return Err(RiError::new(
                ErrorKind::Consistency,
                format!("{}: array argument split across positions", self.kind.name()),
            ));
        }
        Ok(())
    }

    /// Resterende parameters als token/waarde-paren.
    pub fn token_list(self) -> Result<Vec<TokenValue<'a>>, RiError> {
        self.require_boundary()?;
        split_token_list(self.kind, &self.params[self.pos.min(self.params.len())..])
    }
}

/// Eén `"token" waarde` paar uit een parameterlijst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenValue<'a> {
    pub token: &'a str,
    pub value: &'a Parameter,
}

/// Splitst een parameterlijst in token/waarde-paren.
pub fn split_token_list<'a>(
    kind: RequestKind,
    params: &'a [Parameter],
) -> Result<Vec<TokenValue<'a>>, RiError> {
    let mut pairs = Vec::with_capacity(params.len() / 2);
    let mut iter = params.chunks(2);
    for chunk in iter.by_ref() {
        let token = chunk[0].as_str().ok_or_else(|| {
            RiError::new(
                ErrorKind::BadToken,
                format!(
                    "{}: expected a parameter token, found {} value",
                    kind.name(),
                    chunk[0].basic_type().name()
                ),
            )
        })?;
        let Some(value) = chunk.get(1) else {
            return Err(RiError::new(
                ErrorKind::MissingData,
                format!("{}: parameter \"{token}\" has no value", kind.name()),
            ));
        };
        pairs.push(TokenValue { token, value });
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_flatten_numeric_arrays() {
        let params = vec![Parameter::floats(vec![1.0, 2.0]), Parameter::int(3)];
        let mut args = Args::new(RequestKind::Translate, &params);
        assert_eq!(args.floats::<3>().unwrap(), [1.0, 2.0, 3.0]);
        assert!(args.is_done());
    }

    #[test]
    fn args_report_missing_values() {
        let params = vec![Parameter::float(1.0)];
        let mut args = Args::new(RequestKind::Sphere, &params);
        assert!(args.float().is_ok());
        let err = args.float().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingData);
    }

    #[test]
    fn ints_keep_full_precision() {
        let params = vec![Parameter::ints(vec![16_777_217, i32::MAX]), Parameter::float(4.0)];
        let mut args = Args::new(RequestKind::ObjectInstance, &params);
        assert_eq!(args.int().unwrap(), 16_777_217);
        assert_eq!(args.int().unwrap(), i32::MAX);
        assert_eq!(args.int().unwrap(), 4);
        assert!(args.is_done());

        let params = vec![Parameter::float(2.5)];
        let err = Args::new(RequestKind::Sides, &params).int().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Consistency);
    }

    #[test]
    fn token_list_requires_pairs() {
        let params = vec![
            Parameter::string("P"),
            Parameter::floats(vec![0.0; 9]),
            Parameter::string("Cs"),
        ];
        let err = split_token_list(RequestKind::Polygon, &params).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingData);

        let pairs = split_token_list(RequestKind::Polygon, &params[..2]).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].token, "P");
    }

    #[test]
    fn slice_is_clamped() {
        let values = Values::Floats(vec![1.0, 2.0, 3.0]);
        assert_eq!(values.slice(2, 5), Values::Floats(vec![3.0]));
        assert_eq!(values.slice(7, 1), Values::Floats(vec![]));
    }
}
