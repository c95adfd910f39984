//! End-to-end scenarios through the public server API: submit a wire
//! request, drive ticks, observe the response.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gantry_core::{
    codec, ActivityContext, ClassId, ClientId, ContextSet, Host, Invocation, InvokeResult,
    ObjectStore, ProcedureDef, Server, ServiceDescriptor, TypeDescriptor, Value,
};
use gantry_wire as wire;

struct TestHost {
    context: Cell<ActivityContext>,
    time: Cell<f64>,
}

impl TestHost {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            context: Cell::new(ActivityContext::Flight),
            time: Cell::new(100.0),
        })
    }
}

impl Host for TestHost {
    fn activity_context(&self) -> ActivityContext {
        self.context.get()
    }

    fn universal_time(&self) -> f64 {
        self.time.get()
    }
}

fn encode_value(value: &Value, ty: &TypeDescriptor) -> Vec<u8> {
    let mut scratch = ObjectStore::new();
    codec::encode(value, ty, &mut scratch, ClientId::new(0)).unwrap()
}

fn decode_value(bytes: &[u8], ty: &TypeDescriptor) -> Value {
    let mut scratch = ObjectStore::new();
    codec::decode(bytes, ty, &mut scratch, ClientId::new(0)).unwrap()
}

fn request(service: &str, procedure: &str, arguments: Vec<(u32, Vec<u8>)>) -> wire::Request {
    wire::Request {
        service: service.into(),
        procedure: procedure.into(),
        arguments: arguments
            .into_iter()
            .map(|(position, value)| wire::Argument { position, value })
            .collect(),
    }
}

/// Tick until the client's next response arrives.
fn respond(server: &mut Server, client: ClientId) -> wire::Response {
    for _ in 0..100 {
        server.tick();
        let mut responses = server.drain_responses();
        if let Some(index) = responses.iter().position(|(who, _)| *who == client) {
            return responses.swap_remove(index).1;
        }
    }
    panic!("no response for {client} within 100 ticks");
}

#[test]
fn unknown_service_is_reported_verbatim() {
    let mut server = Server::builder(TestHost::new()).build().unwrap();
    let client = ClientId::new(1);

    server.submit(client, request("NonExistant", "X", vec![]));
    let response = respond(&mut server, client);

    assert_eq!(response.error, "UnknownService: NonExistant");
    assert!(response.return_value.is_empty());
}

#[test]
fn single_argument_echo_roundtrip() {
    let mut builder = ServiceDescriptor::builder("TestService");
    builder
        .procedure(
            ProcedureDef::new("Echo", |mut args| Invocation::returning(args.remove(0)))
                .parameter("s", TypeDescriptor::String)
                .returns(TypeDescriptor::String),
        )
        .unwrap();

    let mut server = Server::builder(TestHost::new())
        .service(builder.build().unwrap())
        .unwrap()
        .build()
        .unwrap();
    let client = ClientId::new(1);

    server.submit(
        client,
        request(
            "TestService",
            "Echo",
            vec![(
                0,
                encode_value(&Value::String("foo".into()), &TypeDescriptor::String),
            )],
        ),
    );

    let response = respond(&mut server, client);
    assert_eq!(response.error, "");
    assert_eq!(
        decode_value(&response.return_value, &TypeDescriptor::String),
        Value::String("foo".into())
    );
}

#[test]
fn optional_parameters_bind_sparse_and_out_of_order() {
    let observed = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&observed);

    let mut builder = ServiceDescriptor::builder("TestService");
    builder
        .procedure(
            ProcedureDef::new("F", move |args| {
                *sink.borrow_mut() = Some(args);
                Invocation::void()
            })
            .optional_parameter(
                "a",
                TypeDescriptor::Float,
                codec::encode_literal(&Value::Float(1.0), &TypeDescriptor::Float).unwrap(),
            )
            .optional_parameter(
                "b",
                TypeDescriptor::String,
                codec::encode_literal(&Value::String("x".into()), &TypeDescriptor::String)
                    .unwrap(),
            )
            .optional_parameter(
                "c",
                TypeDescriptor::Int32,
                codec::encode_literal(&Value::Int32(0), &TypeDescriptor::Int32).unwrap(),
            ),
        )
        .unwrap();

    let mut server = Server::builder(TestHost::new())
        .service(builder.build().unwrap())
        .unwrap()
        .build()
        .unwrap();
    let client = ClientId::new(1);

    server.submit(
        client,
        request(
            "TestService",
            "F",
            vec![
                (2, encode_value(&Value::Int32(42), &TypeDescriptor::Int32)),
                (
                    0,
                    encode_value(&Value::Float(3.14159), &TypeDescriptor::Float),
                ),
            ],
        ),
    );

    let response = respond(&mut server, client);
    assert_eq!(response.error, "");
    assert_eq!(
        observed.borrow().clone().unwrap(),
        vec![
            Value::Float(3.14159),
            Value::String("x".into()),
            Value::Int32(42),
        ]
    );
}

/// A host-side domain object exposed through handles.
struct Pod {
    crew: i32,
}

#[test]
fn object_handles_roundtrip_across_services() {
    let class = ClassId::new("ServiceA.Pod");

    // Service A mints Pods; it remembers the last one so the test can check
    // identity on the far side.
    let minted: Rc<RefCell<Option<Rc<Pod>>>> = Rc::new(RefCell::new(None));

    let mint_log = Rc::clone(&minted);
    let make_class = class.clone();
    let mut builder_a = ServiceDescriptor::builder("ServiceA");
    builder_a.class(class.clone());
    builder_a
        .procedure(
            ProcedureDef::new("Make", move |mut args| {
                let _name = args.remove(0);
                let pod = Rc::new(Pod { crew: 3 });
                *mint_log.borrow_mut() = Some(Rc::clone(&pod));
                Invocation::returning(Value::object(make_class.clone(), pod))
            })
            .parameter("s", TypeDescriptor::String)
            .returns(TypeDescriptor::Object(class.clone())),
        )
        .unwrap();

    let seen = Rc::clone(&minted);
    let mut builder_b = ServiceDescriptor::builder("ServiceB");
    builder_b
        .procedure(
            ProcedureDef::new("ReadInt", move |args| {
                let obj = args[0].as_object().expect("receiver must be live");
                let pod = obj.downcast::<Pod>().expect("wrong host type");
                let same = seen
                    .borrow()
                    .as_ref()
                    .map(|original| Rc::ptr_eq(original, &pod))
                    .unwrap_or(false);
                assert!(same, "must be the exact object ServiceA minted");
                Invocation::returning(Value::Int32(pod.crew))
            })
            .parameter("x", TypeDescriptor::Object(class.clone()))
            .returns(TypeDescriptor::Int32),
        )
        .unwrap();

    let mut server = Server::builder(TestHost::new())
        .service(builder_a.build().unwrap())
        .unwrap()
        .service(builder_b.build().unwrap())
        .unwrap()
        .build()
        .unwrap();
    let client = ClientId::new(1);

    server.submit(
        client,
        request(
            "ServiceA",
            "Make",
            vec![(
                0,
                encode_value(&Value::String("jeb".into()), &TypeDescriptor::String),
            )],
        ),
    );
    let response = respond(&mut server, client);
    assert_eq!(response.error, "");
    // A non-null handle came back.
    assert_ne!(response.return_value, vec![0]);

    // Hand the same encoded handle to the other service.
    server.submit(
        client,
        request("ServiceB", "ReadInt", vec![(0, response.return_value)]),
    );
    let response = respond(&mut server, client);
    assert_eq!(response.error, "");
    assert_eq!(
        decode_value(&response.return_value, &TypeDescriptor::Int32),
        Value::Int32(3)
    );
}

/// Yield `n` times, then answer with the original `n`.
fn count_step(remaining: i32, original: i32) -> InvokeResult {
    if remaining == 0 {
        Invocation::returning(Value::Int32(original))
    } else {
        Invocation::yielding(move || count_step(remaining - 1, original))
    }
}

#[test]
fn cooperative_yield_runs_across_ticks_without_blocking_other_clients() {
    let mut builder = ServiceDescriptor::builder("TestService");
    builder
        .procedure(
            ProcedureDef::new("Count", |args| {
                let n = args[0].as_i32().unwrap();
                count_step(n, n)
            })
            .parameter("n", TypeDescriptor::Int32)
            .returns(TypeDescriptor::Int32),
        )
        .unwrap()
        .procedure(
            ProcedureDef::new("Ping", |_| Invocation::returning(Value::Bool(true)))
                .returns(TypeDescriptor::Bool),
        )
        .unwrap();

    let mut server = Server::builder(TestHost::new())
        .service(builder.build().unwrap())
        .unwrap()
        .build()
        .unwrap();
    let counter = ClientId::new(1);
    let bystander = ClientId::new(2);

    server.submit(
        counter,
        request(
            "TestService",
            "Count",
            vec![(0, encode_value(&Value::Int32(10), &TypeDescriptor::Int32))],
        ),
    );

    // Ten ticks of yielding; a bystander request interleaved in each tick
    // completes immediately on its own queue.
    for _ in 0..10 {
        server.submit(bystander, request("TestService", "Ping", vec![]));
        assert_eq!(server.tick(), 1);
        let responses = server.drain_responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, bystander);
    }

    // The eleventh tick finalizes the counter.
    assert_eq!(server.tick(), 1);
    let responses = server.drain_responses();
    assert_eq!(responses[0].0, counter);
    assert_eq!(responses[0].1.error, "");
    assert_eq!(
        decode_value(&responses[0].1.return_value, &TypeDescriptor::Int32),
        Value::Int32(10)
    );
}

#[test]
fn context_mismatch_rejects_without_invoking() {
    let invoked = Rc::new(Cell::new(false));
    let sink = Rc::clone(&invoked);

    let mut builder = ServiceDescriptor::builder("TestService");
    builder
        .procedure(
            ProcedureDef::new("Engage", move |_| {
                sink.set(true);
                Invocation::void()
            })
            .available_in(ContextSet::only([ActivityContext::Flight])),
        )
        .unwrap();

    let host = TestHost::new();
    host.context.set(ActivityContext::TrackingStation);

    let mut server = Server::builder(host)
        .service(builder.build().unwrap())
        .unwrap()
        .build()
        .unwrap();
    let client = ClientId::new(1);

    server.submit(client, request("TestService", "Engage", vec![]));
    let response = respond(&mut server, client);

    assert!(response.error.starts_with("WrongContext"));
    assert!(!invoked.get());
}

#[test]
fn duplicate_dictionary_key_is_invalid_argument() {
    let mut builder = ServiceDescriptor::builder("TestService");
    builder
        .procedure(
            ProcedureDef::new("TakeDict", |_| Invocation::void()).parameter(
                "d",
                TypeDescriptor::dictionary(TypeDescriptor::Int32, TypeDescriptor::String),
            ),
        )
        .unwrap();

    let mut server = Server::builder(TestHost::new())
        .service(builder.build().unwrap())
        .unwrap()
        .build()
        .unwrap();
    let client = ClientId::new(1);

    // Build the malformed dictionary by hand: two entries, both key 1.
    let key = encode_value(&Value::Int32(1), &TypeDescriptor::Int32);
    let dict = wire::Dictionary {
        entries: vec![
            wire::DictionaryEntry {
                key: key.clone(),
                value: encode_value(&Value::String("a".into()), &TypeDescriptor::String),
            },
            wire::DictionaryEntry {
                key,
                value: encode_value(&Value::String("b".into()), &TypeDescriptor::String),
            },
        ],
    };
    let arg = {
        use prost::Message;
        dict.encode_length_delimited_to_vec()
    };

    server.submit(client, request("TestService", "TakeDict", vec![(0, arg)]));
    let response = respond(&mut server, client);
    assert!(response.error.starts_with("InvalidArgument"));
}

#[test]
fn property_accessors_dispatch_like_any_procedure() {
    let throttle = Rc::new(Cell::new(0.0_f32));
    let class = ClassId::new("TestService.Vessel");

    struct Vessel {
        name: &'static str,
    }
    let vessel = Rc::new(Vessel { name: "Kerbal X" });

    let read_throttle = Rc::clone(&throttle);
    let write_throttle = Rc::clone(&throttle);
    let vessel_class = class.clone();
    let the_vessel = Rc::clone(&vessel);

    let mut builder = ServiceDescriptor::builder("TestService");
    builder.class(class.clone());
    builder
        .procedure(
            ProcedureDef::new("get_Throttle", move |_| {
                Invocation::returning(Value::Float(read_throttle.get()))
            })
            .returns(TypeDescriptor::Float),
        )
        .unwrap()
        .procedure(
            ProcedureDef::new("set_Throttle", move |args| {
                write_throttle.set(args[0].as_f32().unwrap());
                Invocation::void()
            })
            .parameter("value", TypeDescriptor::Float),
        )
        .unwrap()
        .procedure(
            ProcedureDef::new("get_ActiveVessel", move |_| {
                Invocation::returning(Value::object(
                    vessel_class.clone(),
                    Rc::clone(&the_vessel) as Rc<dyn std::any::Any>,
                ))
            })
            .returns(TypeDescriptor::Object(class.clone())),
        )
        .unwrap()
        .procedure(
            ProcedureDef::new("Vessel_get_Name", |args| {
                let vessel = args[0]
                    .as_object()
                    .and_then(|obj| obj.downcast::<Vessel>())
                    .expect("receiver must be a vessel");
                Invocation::returning(Value::String(vessel.name.to_owned()))
            })
            .parameter("this", TypeDescriptor::Object(class.clone()))
            .returns(TypeDescriptor::String),
        )
        .unwrap();

    let mut server = Server::builder(TestHost::new())
        .service(builder.build().unwrap())
        .unwrap()
        .build()
        .unwrap();
    let client = ClientId::new(1);

    // Write through the setter, read back through the getter.
    server.submit(
        client,
        request(
            "TestService",
            "set_Throttle",
            vec![(0, encode_value(&Value::Float(0.75), &TypeDescriptor::Float))],
        ),
    );
    assert_eq!(respond(&mut server, client).error, "");

    server.submit(client, request("TestService", "get_Throttle", vec![]));
    let response = respond(&mut server, client);
    assert_eq!(
        decode_value(&response.return_value, &TypeDescriptor::Float),
        Value::Float(0.75)
    );

    // Fetch an object through a service property, then call a class
    // property accessor on the returned handle.
    server.submit(client, request("TestService", "get_ActiveVessel", vec![]));
    let handle_bytes = respond(&mut server, client).return_value;
    assert_ne!(handle_bytes, vec![0]);

    server.submit(
        client,
        request("TestService", "Vessel_get_Name", vec![(0, handle_bytes)]),
    );
    let response = respond(&mut server, client);
    assert_eq!(response.error, "");
    assert_eq!(
        decode_value(&response.return_value, &TypeDescriptor::String),
        Value::String("Kerbal X".into())
    );
}

#[test]
fn responses_are_stamped_with_the_host_clock() {
    let host = TestHost::new();
    host.time.set(4221.125);

    let mut server = Server::builder(Rc::clone(&host) as Rc<dyn Host>)
        .build()
        .unwrap();
    let client = ClientId::new(1);

    server.submit(client, request("Gantry", "GetStatus", vec![]));
    let response = respond(&mut server, client);
    assert_eq!(response.error, "");
    assert_eq!(response.time, 4221.125);
}
