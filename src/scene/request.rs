//! De gesloten verzameling request-soorten en het `Request`-record.

use serde::Serialize;

use super::param::Parameter;

/// Groep waarin een request valt; bepaalt in welke modi hij geldig is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestGroup {
    /// Overal binnen een context geldig.
    Anywhere,
    /// `Begin`/`End` van de context zelf.
    Context,
    FrameBegin,
    WorldBegin,
    /// Opties, camera en texture-aanmaak: alleen buiten de wereld.
    Options,
    /// `AttributeBegin`/`TransformBegin`.
    Block,
    /// Attributen, lichten en shaders die niet in een motion block mogen.
    Attributes,
    /// Attributen die ook binnen een motion block mogen.
    Moving,
    Transforms,
    Geometry,
    SolidBegin,
    ObjectBegin,
    ObjectInstance,
    MotionBegin,
    /// Afsluitende requests; gecontroleerd via `ModeStack::pop`.
    End,
}

macro_rules! request_kinds {
    ($($variant:ident => $name:literal, $group:ident, $arity:literal;)*) => {
        /// Alle requests die de interface kent.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum RequestKind {
            $($variant,)*
        }

        impl RequestKind {
            pub const ALL: &'static [RequestKind] = &[$(RequestKind::$variant,)*];

            /// Naam zoals die in een stroom voorkomt.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(RequestKind::$variant => $name,)*
                }
            }

            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(RequestKind::$variant),)*
                    _ => None,
                }
            }

            #[must_use]
            pub const fn group(self) -> RequestGroup {
                match self {
                    $(RequestKind::$variant => RequestGroup::$group,)*
                }
            }

            /// Minimum aantal positionele waarden voor de parameterlijst.
            #[must_use]
            pub const fn arity(self) -> usize {
                match self {
                    $(RequestKind::$variant => $arity,)*
                }
            }
        }
    };
}

request_kinds! {
    Declare => "Declare", Anywhere, 2;
    ErrorHandler => "ErrorHandler", Anywhere, 1;
    Version => "version", Anywhere, 1;
    System => "System", Anywhere, 1;
    Begin => "Begin", Context, 0;
    End => "End", Context, 0;
    FrameBegin => "FrameBegin", FrameBegin, 1;
    FrameEnd => "FrameEnd", End, 0;
    WorldBegin => "WorldBegin", WorldBegin, 0;
    WorldEnd => "WorldEnd", End, 0;
    AttributeBegin => "AttributeBegin", Block, 0;
    AttributeEnd => "AttributeEnd", End, 0;
    TransformBegin => "TransformBegin", Block, 0;
    TransformEnd => "TransformEnd", End, 0;
    SolidBegin => "SolidBegin", SolidBegin, 1;
    SolidEnd => "SolidEnd", End, 0;
    ObjectBegin => "ObjectBegin", ObjectBegin, 1;
    ObjectEnd => "ObjectEnd", End, 0;
    ObjectInstance => "ObjectInstance", ObjectInstance, 1;
    MotionBegin => "MotionBegin", MotionBegin, 1;
    MotionEnd => "MotionEnd", End, 0;
    ResourceBegin => "ResourceBegin", Anywhere, 0;
    ResourceEnd => "ResourceEnd", End, 0;
    Resource => "Resource", Anywhere, 2;
    ArchiveBegin => "ArchiveBegin", Anywhere, 1;
    ArchiveEnd => "ArchiveEnd", End, 0;
    ReadArchive => "ReadArchive", Anywhere, 1;
    Format => "Format", Options, 3;
    FrameAspectRatio => "FrameAspectRatio", Options, 1;
    ScreenWindow => "ScreenWindow", Options, 4;
    CropWindow => "CropWindow", Options, 4;
    Projection => "Projection", Options, 1;
    Clipping => "Clipping", Options, 2;
    ClippingPlane => "ClippingPlane", Options, 6;
    DepthOfField => "DepthOfField", Options, 3;
    Shutter => "Shutter", Options, 2;
    PixelVariance => "PixelVariance", Options, 1;
    PixelSamples => "PixelSamples", Options, 2;
    PixelFilter => "PixelFilter", Options, 3;
    Exposure => "Exposure", Options, 2;
    Imager => "Imager", Options, 1;
    Quantize => "Quantize", Options, 5;
    Display => "Display", Options, 3;
    DisplayChannel => "DisplayChannel", Options, 1;
    Hider => "Hider", Options, 1;
    ColorSamples => "ColorSamples", Options, 2;
    RelativeDetail => "RelativeDetail", Options, 1;
    Option => "Option", Options, 1;
    Camera => "Camera", Options, 1;
    MakeTexture => "MakeTexture", Options, 7;
    MakeBump => "MakeBump", Options, 7;
    MakeLatLongEnvironment => "MakeLatLongEnvironment", Options, 5;
    MakeCubeFaceEnvironment => "MakeCubeFaceEnvironment", Options, 11;
    MakeShadow => "MakeShadow", Options, 2;
    MakeBrickMap => "MakeBrickMap", Options, 2;
    LightSource => "LightSource", Moving, 2;
    AreaLightSource => "AreaLightSource", Moving, 2;
    Illuminate => "Illuminate", Attributes, 2;
    Attribute => "Attribute", Attributes, 1;
    Color => "Color", Moving, 1;
    Opacity => "Opacity", Moving, 1;
    Surface => "Surface", Moving, 1;
    Atmosphere => "Atmosphere", Moving, 1;
    Interior => "Interior", Moving, 1;
    Exterior => "Exterior", Moving, 1;
    Displacement => "Displacement", Moving, 1;
    Shader => "Shader", Attributes, 2;
    TextureCoordinates => "TextureCoordinates", Moving, 8;
    ShadingRate => "ShadingRate", Attributes, 1;
    ShadingInterpolation => "ShadingInterpolation", Attributes, 1;
    Matte => "Matte", Attributes, 1;
    Bound => "Bound", Attributes, 6;
    Detail => "Detail", Attributes, 6;
    DetailRange => "DetailRange", Attributes, 4;
    GeometricApproximation => "GeometricApproximation", Attributes, 2;
    GeometricRepresentation => "GeometricRepresentation", Attributes, 1;
    Orientation => "Orientation", Attributes, 1;
    ReverseOrientation => "ReverseOrientation", Attributes, 0;
    Sides => "Sides", Attributes, 1;
    Basis => "Basis", Moving, 4;
    TrimCurve => "TrimCurve", Attributes, 10;
    Identity => "Identity", Transforms, 0;
    Transform => "Transform", Transforms, 16;
    ConcatTransform => "ConcatTransform", Transforms, 16;
    Perspective => "Perspective", Transforms, 1;
    Translate => "Translate", Transforms, 3;
    Rotate => "Rotate", Transforms, 4;
    Scale => "Scale", Transforms, 3;
    Skew => "Skew", Transforms, 7;
    Deformation => "Deformation", Transforms, 1;
    CoordinateSystem => "CoordinateSystem", Transforms, 1;
    ScopedCoordinateSystem => "ScopedCoordinateSystem", Transforms, 1;
    CoordSysTransform => "CoordSysTransform", Transforms, 1;
    Polygon => "Polygon", Geometry, 0;
    GeneralPolygon => "GeneralPolygon", Geometry, 1;
    PointsPolygons => "PointsPolygons", Geometry, 2;
    PointsGeneralPolygons => "PointsGeneralPolygons", Geometry, 3;
    Patch => "Patch", Geometry, 1;
    PatchMesh => "PatchMesh", Geometry, 5;
    NuPatch => "NuPatch", Geometry, 10;
    SubdivisionMesh => "SubdivisionMesh", Geometry, 3;
    Sphere => "Sphere", Geometry, 4;
    Cone => "Cone", Geometry, 3;
    Cylinder => "Cylinder", Geometry, 4;
    Hyperboloid => "Hyperboloid", Geometry, 7;
    Paraboloid => "Paraboloid", Geometry, 4;
    Disk => "Disk", Geometry, 3;
    Torus => "Torus", Geometry, 5;
    Points => "Points", Geometry, 0;
    Curves => "Curves", Geometry, 3;
    Blobby => "Blobby", Geometry, 4;
    Procedural => "Procedural", Geometry, 3;
    Geometry => "Geometry", Geometry, 1;
}

impl RequestKind {
    /// Request-namen die het dichtst bij `name` liggen, voor "bedoelde u" meldingen.
    #[must_use]
    pub fn suggest(name: &str) -> Option<&'static str> {
        let lower = name.to_ascii_lowercase();
        Self::ALL
            .iter()
            .map(|kind| {
                let candidate = kind.name();
                let distance =
                    levenshtein::levenshtein(&lower, &candidate.to_ascii_lowercase());
                (distance, candidate)
            })
            .filter(|(distance, candidate)| *distance <= (candidate.len() / 3).max(2))
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate)
    }

    /// Of dit een primitief is dat oppervlakken kan opleveren.
    #[must_use]
    pub const fn is_geometry(self) -> bool {
        matches!(self.group(), RequestGroup::Geometry)
    }
}

/// Eén interface-aanroep: soort, bronregel en geordende parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub kind: RequestKind,
    pub line: usize,
    pub params: Vec<Parameter>,
}

impl Request {
    #[must_use]
    pub fn new(kind: RequestKind, params: Vec<Parameter>) -> Self {
        Self {
            kind,
            line: 0,
            params,
        }
    }

    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Aantal positionele waarden; arrays tellen met hun lengte mee.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.params
            .iter()
            .map(|p| if p.is_array { p.len() } else { 1 })
            .sum()
    }
}
