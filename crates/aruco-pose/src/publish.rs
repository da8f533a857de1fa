//! Binary detection packets and UDP publishing.
//!
//! Wire layout (all little-endian): `u64` marker count, then per marker an
//! `i64` id, three `f32` position components and three `f32` rotation-vector
//! components, then `f64` processing time and `f64` capture timestamp in
//! seconds.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::result::DetectedMarker;

/// One frame's worth of detections, ready for serialization.
#[derive(Clone, Copy, Debug)]
pub struct FramePacket<'a> {
    pub markers: &'a [DetectedMarker],
    /// Processing time for the frame, seconds.
    pub elapsed: f64,
    /// Capture timestamp, seconds since an epoch the receiver agrees on.
    pub timestamp: f64,
}

impl FramePacket<'_> {
    /// Bytes per serialized marker: `i64` id plus six `f32` components.
    const MARKER_BYTES: usize = 8 + 6 * 4;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(8 + self.markers.len() * Self::MARKER_BYTES + 16);
        out.extend_from_slice(&(self.markers.len() as u64).to_le_bytes());
        for m in self.markers {
            out.extend_from_slice(&(m.id as i64).to_le_bytes());
            for v in m.position.iter() {
                out.extend_from_slice(&(*v as f32).to_le_bytes());
            }
            for v in m.rotation_vector().iter() {
                out.extend_from_slice(&(*v as f32).to_le_bytes());
            }
        }
        out.extend_from_slice(&self.elapsed.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out
    }
}

/// Sends frame packets to a fixed receiver over UDP.
pub struct UdpPublisher {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpPublisher {
    /// Bind an ephemeral local socket aimed at `target`.
    pub fn new<A: ToSocketAddrs>(target: A) -> io::Result<Self> {
        let target = target
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no target address"))?;
        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        Ok(Self { socket, target })
    }

    /// Serialize and send one packet; returns the number of bytes sent.
    pub fn publish(&self, packet: &FramePacket<'_>) -> io::Result<usize> {
        self.socket.send_to(&packet.to_bytes(), self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point2, UnitQuaternion, Vector3};

    fn marker(id: u32, position: Vector3<f64>) -> DetectedMarker {
        DetectedMarker {
            id,
            corners: [Point2::new(0.0_f32, 0.0); 4],
            position,
            orientation: UnitQuaternion::identity(),
            hamming: 0,
            border_score: 1.0,
            image_width: 640,
            image_height: 480,
        }
    }

    #[test]
    fn empty_packet_layout() {
        let packet = FramePacket {
            markers: &[],
            elapsed: 0.25,
            timestamp: 1000.5,
        };
        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), 8 + 16);
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 0);
        assert_eq!(f64::from_le_bytes(bytes[8..16].try_into().unwrap()), 0.25);
        assert_eq!(f64::from_le_bytes(bytes[16..24].try_into().unwrap()), 1000.5);
    }

    #[test]
    fn marker_fields_are_little_endian() {
        let packet = FramePacket {
            markers: &[marker(42, Vector3::new(0.5, -0.25, 2.0))],
            elapsed: 0.0,
            timestamp: 0.0,
        };
        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), 8 + 32 + 16);
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 1);
        assert_eq!(i64::from_le_bytes(bytes[8..16].try_into().unwrap()), 42);
        assert_eq!(f32::from_le_bytes(bytes[16..20].try_into().unwrap()), 0.5);
        assert_eq!(f32::from_le_bytes(bytes[20..24].try_into().unwrap()), -0.25);
        assert_eq!(f32::from_le_bytes(bytes[24..28].try_into().unwrap()), 2.0);
        // Identity orientation serializes a zero rotation vector.
        for chunk in bytes[28..40].chunks(4) {
            assert_eq!(f32::from_le_bytes(chunk.try_into().unwrap()), 0.0);
        }
    }

    #[test]
    fn loopback_round_trip() {
        let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
        let publisher = UdpPublisher::new(receiver.local_addr().expect("addr")).expect("publisher");

        let packet = FramePacket {
            markers: &[marker(7, Vector3::new(0.0, 0.0, 1.0))],
            elapsed: 0.01,
            timestamp: 5.0,
        };
        let sent = publisher.publish(&packet).expect("send");

        let mut buf = [0u8; 128];
        let (received, _) = receiver.recv_from(&mut buf).expect("recv");
        assert_eq!(received, sent);
        assert_eq!(&buf[..received], packet.to_bytes().as_slice());
    }
}
