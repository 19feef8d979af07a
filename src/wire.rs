// FIRASim command packet encoding
//
// Only the command subset of fira_message.sim_to_ref is produced:
//   Packet   { Commands cmd = 1; }
//   Commands { repeated Command robot_commands = 1; }
//   Command  { uint32 id = 1; bool yellowteam = 2; double wheel_left = 3; double wheel_right = 4; }
// Encoding follows proto3: fields holding their default value are omitted.

use crate::table::WheelCommand;

/// Protobuf wire types
const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// Field numbers
const PACKET_CMD: u32 = 1;
const COMMANDS_ROBOT_COMMANDS: u32 = 1;
const COMMAND_ID: u32 = 1;
const COMMAND_YELLOW_TEAM: u32 = 2;
const COMMAND_WHEEL_LEFT: u32 = 3;
const COMMAND_WHEEL_RIGHT: u32 = 4;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WireError {
    #[error("Packet truncated at byte {0}")]
    Truncated(usize),

    #[error("Varint too long at byte {0}")]
    VarintOverflow(usize),

    #[error("Unsupported wire type {wire_type} for field {field}")]
    UnsupportedWireType { field: u32, wire_type: u8 },
}

pub type Result<T> = std::result::Result<T, WireError>;

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_key(buf: &mut Vec<u8>, field: u32, wire_type: u8) {
    put_varint(buf, u64::from(field << 3 | u32::from(wire_type)));
}

fn put_message(buf: &mut Vec<u8>, field: u32, body: &[u8]) {
    put_key(buf, field, WIRE_LEN);
    put_varint(buf, body.len() as u64);
    buf.extend_from_slice(body);
}

fn put_double(buf: &mut Vec<u8>, field: u32, value: f64) {
    // -0.0 has non-zero bits and is kept, as protobuf does
    if value.to_bits() != 0 {
        put_key(buf, field, WIRE_FIXED64);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

fn encode_robot_command(cmd: &WheelCommand) -> Vec<u8> {
    let mut body = Vec::with_capacity(24);
    if cmd.id != 0 {
        put_key(&mut body, COMMAND_ID, WIRE_VARINT);
        put_varint(&mut body, u64::from(cmd.id));
    }
    if cmd.yellow_team {
        put_key(&mut body, COMMAND_YELLOW_TEAM, WIRE_VARINT);
        body.push(1);
    }
    put_double(&mut body, COMMAND_WHEEL_LEFT, cmd.wheel_left);
    put_double(&mut body, COMMAND_WHEEL_RIGHT, cmd.wheel_right);
    body
}

/// Build a complete Packet carrying the given robot commands
pub fn encode_packet(commands: &[WheelCommand]) -> Vec<u8> {
    let mut cmd = Vec::with_capacity(commands.len() * 26);
    for command in commands {
        put_message(&mut cmd, COMMANDS_ROBOT_COMMANDS, &encode_robot_command(command));
    }

    let mut packet = Vec::with_capacity(cmd.len() + 4);
    put_message(&mut packet, PACKET_CMD, &cmd);
    packet
}

/// Build the single-command datagram the scheduler sends
pub fn encode_command(command: &WheelCommand) -> Vec<u8> {
    encode_packet(std::slice::from_ref(command))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

enum Field<'a> {
    Varint(u64),
    Fixed64([u8; 8]),
    Bytes(&'a [u8]),
    Fixed32,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(WireError::Truncated(self.pos))?;
        let bytes = self.buf.get(self.pos..end).ok_or(WireError::Truncated(self.pos))?;
        self.pos = end;
        Ok(bytes)
    }

    fn varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.take(1)?[0];
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(WireError::VarintOverflow(start))
    }

    fn field(&mut self) -> Result<(u32, Field<'a>)> {
        let key = self.varint()?;
        let number = (key >> 3) as u32;
        let field = match (key & 0x07) as u8 {
            WIRE_VARINT => Field::Varint(self.varint()?),
            WIRE_FIXED64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(8)?);
                Field::Fixed64(raw)
            }
            WIRE_LEN => {
                let len = self.varint()? as usize;
                Field::Bytes(self.take(len)?)
            }
            WIRE_FIXED32 => {
                self.take(4)?;
                Field::Fixed32
            }
            wire_type => {
                return Err(WireError::UnsupportedWireType {
                    field: number,
                    wire_type,
                });
            }
        };
        Ok((number, field))
    }
}

fn decode_robot_command(body: &[u8]) -> Result<WheelCommand> {
    let mut cmd = WheelCommand {
        id: 0,
        yellow_team: false,
        wheel_left: 0.0,
        wheel_right: 0.0,
    };
    let mut reader = Reader::new(body);
    while !reader.done() {
        match reader.field()? {
            (COMMAND_ID, Field::Varint(v)) => cmd.id = v as u32,
            (COMMAND_YELLOW_TEAM, Field::Varint(v)) => cmd.yellow_team = v != 0,
            (COMMAND_WHEEL_LEFT, Field::Fixed64(raw)) => cmd.wheel_left = f64::from_le_bytes(raw),
            (COMMAND_WHEEL_RIGHT, Field::Fixed64(raw)) => cmd.wheel_right = f64::from_le_bytes(raw),
            _ => {} // unknown field
        }
    }
    Ok(cmd)
}

/// Decode the robot commands of a Packet, skipping everything else
pub fn decode_packet(buf: &[u8]) -> Result<Vec<WheelCommand>> {
    let mut commands = Vec::new();
    let mut packet = Reader::new(buf);
    while !packet.done() {
        if let (PACKET_CMD, Field::Bytes(cmd)) = packet.field()? {
            let mut reader = Reader::new(cmd);
            while !reader.done() {
                if let (COMMANDS_ROBOT_COMMANDS, Field::Bytes(body)) = reader.field()? {
                    commands.push(decode_robot_command(body)?);
                }
            }
        }
    }
    Ok(commands)
}
