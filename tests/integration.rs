use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rib_engine::interp::{SceneCollector, Session, SessionOptions};
use rib_engine::parse::{Encoding, decode_requests, encode_requests};
use rib_engine::scene::{
    Args, DeclarationDictionary, ErrorCollect, ErrorKind, Mode, ModeStack, Parameter, Request,
    RequestKind, Values,
};
use rib_engine::vars::PrimVars;
use rib_engine::vars::counts;

fn run(bytes: &[u8]) -> (SceneCollector, ErrorCollect) {
    let mut session = Session::with_handler(SceneCollector::new(), ErrorCollect::new(), SessionOptions::default());
    session.read_bytes(bytes, "scene.rib");
    session.finish()
}

fn sample_request(kind: RequestKind) -> Request {
    Request::new(
        kind,
        vec![
            Parameter::float(0.5),
            Parameter::int(3),
            Parameter::string("name"),
            Parameter::floats(vec![0.25, -1.5, 1e-3]),
            Parameter::ints(vec![7, -300]),
            Parameter::strings(vec!["a".into(), "interpolateboundary".into()]),
        ],
    )
}

fn same_stream(decoded: &[Request], expected: &[Request]) {
    assert_eq!(decoded.len(), expected.len());
    for (got, want) in decoded.iter().zip(expected) {
        assert_eq!(got.kind, want.kind);
        assert_eq!(got.params, want.params, "parameters of {}", want.kind.name());
    }
}

#[test]
fn every_request_kind_survives_both_encodings() {
    let requests: Vec<Request> = RequestKind::ALL.iter().map(|&kind| sample_request(kind)).collect();

    let ascii = encode_requests(&requests, Encoding::Ascii).unwrap();
    let binary = encode_requests(&requests, Encoding::Binary).unwrap();
    same_stream(&decode_requests(&ascii), &requests);
    same_stream(&decode_requests(&binary), &requests);

    // Re-encoding a decoded stream in the other encoding changes nothing.
    let via_binary = encode_requests(&decode_requests(&binary), Encoding::Ascii).unwrap();
    same_stream(&decode_requests(&via_binary), &requests);
    let via_ascii = encode_requests(&decode_requests(&ascii), Encoding::Binary).unwrap();
    same_stream(&decode_requests(&via_ascii), &requests);
}

#[test]
fn text_and_binary_mix_in_one_stream() {
    let first = vec![sample_request(RequestKind::Translate)];
    let second = vec![sample_request(RequestKind::Sphere), sample_request(RequestKind::Sphere)];
    let mut bytes = encode_requests(&first, Encoding::Ascii).unwrap();
    bytes.extend(encode_requests(&second, Encoding::Binary).unwrap());
    let decoded = decode_requests(&bytes);
    let expected: Vec<Request> = first.into_iter().chain(second).collect();
    same_stream(&decoded, &expected);
}

#[test]
fn binary_sphere_decodes_to_its_floats() {
    let sphere = Request::new(
        RequestKind::Sphere,
        vec![
            Parameter::float(1.0),
            Parameter::float(-1.0),
            Parameter::float(1.0),
            Parameter::float(360.0),
        ],
    );
    let bytes = encode_requests(&[sphere], Encoding::Binary).unwrap();
    let decoded = decode_requests(&bytes);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].kind, RequestKind::Sphere);
    let mut args = Args::new(RequestKind::Sphere, &decoded[0].params);
    let floats = args.floats::<4>().unwrap();
    for (got, want) in floats.iter().zip([1.0, -1.0, 1.0, 360.0]) {
        assert!((got - want).abs() < 1e-6, "{got} != {want}");
    }
    assert!(args.is_done());
}

#[test]
fn unknown_request_between_blocks_is_skipped() {
    let mut session = Session::with_handler(SceneCollector::new(), ErrorCollect::new(), SessionOptions::default());
    session.read_bytes(
        b"WorldBegin\n\
          AttributeBegin\n\
          Sphere 1 -1 1 360\n\
          AttributeEnd\n\
          Frobnicate 1 2 [3 4] \"five\"\n\
          AttributeBegin\n\
          Disk 0 1 360\n\
          AttributeEnd\n",
        "scene.rib",
    );
    assert_eq!(session.modes().modes(), &[Mode::Begin, Mode::World]);
    assert_eq!(session.state().depth(), 1);
    let (scene, errors) = session.finish();
    assert_eq!(scene.count(RequestKind::AttributeBegin), 2);
    assert_eq!(scene.count(RequestKind::AttributeEnd), 2);
    assert_eq!(scene.surfaces.len(), 2);
    assert_eq!(errors.count(ErrorKind::Syntax), 1);
    assert!(errors.errors[0].message.contains("Frobnicate"));
}

#[test]
fn declared_uniform_binds_one_value_per_face() {
    let mut dict = DeclarationDictionary::with_defaults();
    dict.declare("foo", "uniform float").unwrap();
    let params = vec![
        Parameter::string("Cs"),
        Parameter::floats(vec![0.5; 12]),
        Parameter::string("P"),
        Parameter::floats(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]),
        Parameter::string("foo"),
        Parameter::floats(vec![1.0, 2.0, 3.0]),
    ];
    let list = Args::new(RequestKind::PointsPolygons, &params).token_list().unwrap();
    let nverts = [3, 3, 3];
    let verts = [0, 1, 2, 0, 2, 3, 0, 3, 1];
    let vars = PrimVars::bind(&mut dict, &list, &counts::points_polygons(&nverts, &verts)).unwrap();
    let foo = vars.get("foo").unwrap();
    assert_eq!(foo.count(), 3);
    assert_eq!(foo.values, Values::Floats(vec![1.0, 2.0, 3.0]));
}

#[test]
fn declared_uniform_reaches_each_face_surface() {
    let (scene, errors) = run(b"Declare \"foo\" \"uniform float\"\n\
          WorldBegin\n\
          PointsPolygons [3 3 3] [0 1 2 0 2 3 0 3 1]\n\
            \"P\" [0 0 0 1 0 0 1 1 0 0 1 0] \"foo\" [1 2 3]\n\
          WorldEnd\n");
    assert!(errors.errors.is_empty(), "{:?}", errors.errors);
    let foo: Vec<Values> = scene.surfaces.iter().map(|s| s.var("foo").unwrap().values.clone()).collect();
    assert_eq!(
        foo,
        vec![
            Values::Floats(vec![1.0]),
            Values::Floats(vec![2.0]),
            Values::Floats(vec![3.0]),
        ]
    );
}

#[test]
fn wrong_value_count_rejects_only_that_primitive() {
    let (scene, errors) = run(b"WorldBegin\n\
          Polygon \"P\" [0 0 0 1 0 0 1 1 0] \"Cs\" [1 0 0]\n\
          Polygon \"P\" [0 0 0 1 0 0 1 1 0]\n\
          WorldEnd\n");
    assert_eq!(scene.surfaces.len(), 1);
    assert_eq!(errors.count(ErrorKind::Consistency), 1);
    assert_eq!(errors.errors[0].line, Some(2));
}

#[test]
fn mode_stack_never_changes_on_rejected_calls() {
    let modes = [
        Mode::Frame,
        Mode::World,
        Mode::Attribute,
        Mode::Transform,
        Mode::Solid,
        Mode::Object,
        Mode::Motion,
        Mode::Resource,
        Mode::Archive,
    ];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut stack = ModeStack::new();
    stack.push(Mode::Begin).unwrap();
    for _ in 0..2000 {
        let mode = modes[rng.random_range(0..modes.len())];
        let before = stack.modes().to_vec();
        if rng.random_bool(0.5) {
            match stack.push(mode) {
                Ok(()) => assert_eq!(stack.depth(), before.len() + 1),
                Err(err) => {
                    assert_eq!(err.kind, ErrorKind::Nesting);
                    assert_eq!(stack.modes(), &before[..]);
                }
            }
        } else {
            match stack.pop(mode) {
                Ok(popped) => {
                    assert_eq!(popped, mode);
                    assert_eq!(stack.depth(), before.len() - 1);
                }
                Err(_) => assert_eq!(stack.modes(), &before[..]),
            }
        }
        assert_eq!(stack.modes().first(), Some(&Mode::Begin));
    }
}

#[test]
fn geometry_is_only_valid_inside_the_world() {
    let mut stack = ModeStack::new();
    assert!(stack.is_valid(RequestKind::Begin));
    assert!(!stack.is_valid(RequestKind::Sphere));
    stack.push(Mode::Begin).unwrap();
    assert!(!stack.is_valid(RequestKind::Begin));
    assert!(!stack.is_valid(RequestKind::Sphere));
    assert!(stack.is_valid(RequestKind::Format));
    stack.push(Mode::World).unwrap();
    assert!(stack.is_valid(RequestKind::Sphere));
    assert!(!stack.is_valid(RequestKind::Format));
    assert!(!stack.is_valid(RequestKind::AttributeEnd));
    assert!(stack.is_valid(RequestKind::WorldEnd));
    stack.push(Mode::Archive).unwrap();
    assert!(stack.is_valid(RequestKind::Sphere));
}

#[test]
fn nurbs_and_patches_share_transforms_and_colors() {
    let (scene, errors) = run(b"Attribute \"tessellation\" \"integer u\" [2] \"integer v\" [2]\n\
          WorldBegin\n\
          Color [1 0 0]\n\
          Translate 0 0 5\n\
          Patch \"bilinear\" \"P\" [0 0 0 1 0 0 0 1 0 1 1 0] \"s\" [0 1 0 1]\n\
          NuPatch 2 2 [0 0 1 1] 0 1 2 2 [0 0 1 1] 0 1 \"Pw\" [0 0 0 1 2 0 0 2 0 1 0 1 1 1 0 1]\n\
          WorldEnd\n");
    assert!(errors.errors.is_empty(), "{:?}", errors.errors);
    assert_eq!(scene.surfaces.len(), 2);
    for surface in &scene.surfaces {
        assert_eq!(surface.vertex_count(), 9);
        assert!((surface.transform[14] - 5.0).abs() < 1e-6);
        assert_eq!(surface.var("Cs").unwrap().values, Values::Floats(vec![1.0, 0.0, 0.0]));
    }
    // The weighted corner (1, 0) lands at x = 1 after the divide.
    let nurbs = &scene.surfaces[1];
    assert!((nurbs.positions[2][0] - 1.0).abs() < 1e-6);
}
