use std::cell::RefCell;
use std::collections::BTreeMap;
use std::thread;

use wiregen_example::testing::CanvasTestBase;
use wiregen_example::*;
use wiregen_wire::{local_pair, AsyncTransport, Error, Handle, Message, ServerEnd, ServiceDirectory, Transport};

#[derive(Default)]
struct Sketch {
    shapes: Vec<Shape>,
    points: BTreeMap<u32, Point>,
}

impl Canvas for Sketch {
    fn add_shape(&mut self, shape: Shape) {
        if let Shape::Point(point) = &shape {
            self.points.insert(self.shapes.len() as u32, point.clone());
        }
        self.shapes.push(shape);
    }

    fn area(&mut self, polygon: Polygon) -> CanvasAreaResponse {
        CanvasAreaResponse { area: polygon_area(&polygon) }
    }

    fn lookup(&mut self, id: u32) -> Result<CanvasLookupResponse, u32> {
        self.points.get(&id).cloned().map(|point| CanvasLookupResponse { point }).ok_or(404)
    }

    fn clear(&mut self) {
        self.shapes.clear();
        self.points.clear();
    }
}

fn triangle() -> Polygon {
    Polygon {
        points: vec![Point { x: 0, y: 0 }, Point { x: 6, y: 0 }, Point { x: 0, y: 3 }],
        color:  Color::Blue,
        label:  None,
    }
}

#[test]
fn sync_proxy_talks_to_a_stub() {
    let (client, server) = local_pair();
    let server = thread::spawn(move || {
        let mut stub = CanvasStub::new(Sketch::default());
        stub.serve(&server).map(|()| stub.into_inner())
    });

    let proxy = CanvasSyncProxy::new(client);
    proxy.add_shape(Shape::Point(Point { x: 7, y: 8 })).unwrap();
    assert_eq!(proxy.area(triangle()).unwrap(), CanvasAreaResponse { area: 9.0 });
    assert_eq!(proxy.lookup(0).unwrap(), Ok(CanvasLookupResponse { point: Point { x: 7, y: 8 } }));
    assert_eq!(proxy.lookup(5).unwrap(), Err(404));
    proxy.add_shape(Shape::Polygon(triangle())).unwrap();
    drop(proxy);

    let sketch = server.join().unwrap().unwrap();
    assert_eq!(sketch.shapes.len(), 2);
}

#[test]
fn two_way_method_with_empty_response() {
    let (client, server) = local_pair();
    let server = thread::spawn(move || {
        let mut stub = CanvasStub::new(Sketch::default());
        stub.get_mut().add_shape(Shape::Point(Point { x: 1, y: 1 }));
        stub.serve(&server).map(|()| stub.into_inner())
    });

    let proxy = CanvasSyncProxy::new(client);
    proxy.clear().unwrap();
    drop(proxy);
    assert!(server.join().unwrap().unwrap().shapes.is_empty());
}

#[test]
fn events_reach_the_proxy() {
    let (client, server) = local_pair();
    CanvasEventSender::new(&server).send_on_drawn(3).unwrap();

    let proxy = CanvasSyncProxy::new(client);
    assert_eq!(proxy.wait_for_event().unwrap(), CanvasEvent::OnDrawn(CanvasOnDrawnEvent { count: 3 }));
}

#[test]
fn replies_skip_pending_events() {
    let (client, server) = local_pair();
    let server = thread::spawn(move || -> Result<(), Error> {
        let mut stub = CanvasStub::new(Sketch::default());
        let request = server.recv()?;
        CanvasEventSender::new(&server).send_on_drawn(1)?;
        if let Some(reply) = stub.dispatch(&request)? {
            server.send(reply)?;
        }
        Ok(())
    });

    let proxy = CanvasSyncProxy::new(client);
    assert_eq!(proxy.area(triangle()).unwrap().area, 9.0);
    server.join().unwrap().unwrap();
}

#[test]
fn dispatch_rejects_unknown_ordinals() {
    let mut stub = CanvasStub::new(Sketch::default());
    let message = Message::encode(1, 0x99, &()).unwrap();
    assert_eq!(
        stub.dispatch(&message).unwrap_err(),
        Error::UnknownOrdinal { protocol: "demo.geometry.Canvas", ordinal: 0x99 }
    );

    let request = CanvasAddShapeRequest { shape: Shape::Point(Point { x: 0, y: 0 }) };
    let one_way = Message::encode(0, CanvasMarker::ADD_SHAPE_ORDINAL, &request).unwrap();
    assert!(stub.dispatch(&one_way).unwrap().is_none());
    assert_eq!(stub.get_ref().shapes.len(), 1);
}

#[test]
fn results_travel_as_unions() {
    let ok = CanvasLookupResult::from_result(Ok(CanvasLookupResponse { point: Point { x: 1, y: 2 } }));
    assert_eq!(ok.tag(), CanvasLookupResultTag::Response);
    assert_eq!(CanvasLookupResult::Err(7).into_result(), Err(7));
}

/// Runs every call through a stub on the same task.
struct InlineTransport {
    stub: RefCell<CanvasStub<Sketch>>,
}

impl AsyncTransport for InlineTransport {
    async fn send(&self, message: Message) -> Result<(), Error> {
        self.stub.borrow_mut().dispatch(&message).map(|_| ())
    }

    async fn recv(&self) -> Result<Message, Error> {
        Err(Error::PeerClosed)
    }

    async fn call(&self, message: Message) -> Result<Message, Error> {
        self.stub.borrow_mut().dispatch(&message)?.ok_or(Error::PeerClosed)
    }
}

#[tokio::test]
async fn async_proxy_calls() {
    let transport = InlineTransport { stub: RefCell::new(CanvasStub::new(Sketch::default())) };
    let proxy = CanvasProxy::new(transport);

    proxy.add_shape(Shape::Point(Point { x: 2, y: 3 })).await.unwrap();
    assert_eq!(proxy.area(triangle()).await.unwrap().area, 9.0);
    assert_eq!(proxy.lookup(0).await.unwrap().unwrap().point, Point { x: 2, y: 3 });
    assert_eq!(proxy.lookup(1).await.unwrap(), Err(404));
    proxy.clear().await.unwrap();
    assert_eq!(proxy.next_event().await.unwrap_err(), Error::PeerClosed);

    let transport = proxy.into_inner();
    assert!(transport.stub.borrow().get_ref().shapes.is_empty());
}

struct AreaOnly;

impl CanvasTestBase for AreaOnly {
    fn not_implemented(&mut self, name: &str) -> ! {
        panic!("{} is not implemented", name)
    }

    fn area(&mut self, polygon: Polygon) -> CanvasAreaResponse {
        CanvasAreaResponse { area: polygon_area(&polygon) * 2.0 }
    }
}

#[test]
fn test_base_overrides() {
    let mut stub = CanvasStub::new(AreaOnly);
    let request = Message::encode(4, CanvasMarker::AREA_ORDINAL, &CanvasAreaRequest { polygon: triangle() }).unwrap();
    let reply = stub.dispatch(&request).unwrap().unwrap();
    assert_eq!(reply.header().unwrap().txid, 4);
    let response = reply.decode_reply::<CanvasAreaResponse>(CanvasMarker::AREA_ORDINAL).unwrap();
    assert_eq!(response.area, 18.0);
}

#[test]
#[should_panic(expected = "Lookup is not implemented")]
fn test_base_defaults_panic() {
    let _ = Canvas::lookup(&mut AreaOnly, 1);
}

#[derive(Default)]
struct Directory {
    opened: RefCell<Vec<(String, String, u32)>>,
}

impl ServiceDirectory for &Directory {
    fn connect(&self, service: &str, member: &str, channel: Handle) -> Result<(), Error> {
        self.opened.borrow_mut().push((service.to_string(), member.to_string(), channel.raw()));
        Ok(())
    }
}

#[test]
fn service_client_opens_members() {
    assert_eq!(StudioMarker::NAME, "demo.geometry.Studio");
    assert_eq!(StudioMarker::MEMBERS, ["canvas"]);

    let directory = Directory::default();
    let client = StudioClient::new(&directory);
    client.connect_to_canvas(ServerEnd::<CanvasMarker>::new(Handle::from_raw(42))).unwrap();
    assert_eq!(
        directory.opened.borrow().as_slice(),
        [("demo.geometry.Studio".to_string(), "canvas".to_string(), 42)]
    );
}
