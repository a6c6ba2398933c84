//! The join sequence: everything a freshly logged-in client needs before
//! it can render the world and move.

use std::sync::Arc;

use lodestone_protocol::packets::play::{
    DeclareCommands, DeclareRecipes, HeldItemChangeClientbound, JoinGame, PlayerInfo,
    PlayerInfoEntry, PlayerPositionAndLook, SpawnPosition, TimeUpdate, UpdateViewPosition,
};
use lodestone_protocol::packets::ClientboundPacket;
use lodestone_protocol::types::{
    CommandNode, CommandNodeKind, CommandParser, DimensionCodec, DimensionType, ItemStack,
    Position, Recipe, RecipeBody,
};
use tracing::debug;

use crate::core::server::ServerContext;
use crate::core::session::{ConnectionHandle, OutboundMessage};
use crate::error::ConnectionError;
use crate::handler::PlayerProfile;
use crate::network::encode_packet;

/// Chunk radius streamed on join.
const JOIN_VIEW_DISTANCE: i32 = 2;

const SPAWN: Position = Position::new(8, 4, 8);

async fn send(
    ctx: &ServerContext,
    handle: &ConnectionHandle,
    packet: &ClientboundPacket,
) -> Result<(), ConnectionError> {
    let bytes = encode_packet(&ctx.pool, packet)?;
    let message = OutboundMessage::Packet(bytes);

    if packet.is_lossy() {
        // Same policy as the handler boundary: drop rather than stall.
        let _ = handle.outbound.try_send(message);
        Ok(())
    } else {
        handle
            .outbound
            .send(message)
            .await
            .map_err(|_| ConnectionError::Io(std::io::ErrorKind::BrokenPipe.into()))
    }
}

pub async fn send_join_sequence(
    ctx: &Arc<ServerContext>,
    handle: &Arc<ConnectionHandle>,
    profile: &PlayerProfile,
) -> Result<(), ConnectionError> {
    let entity_id = handle.id as i32;

    send(
        ctx,
        handle,
        &ClientboundPacket::JoinGame(Box::new(JoinGame {
            entity_id,
            is_hardcore: false,
            gamemode: 1, // creative
            previous_gamemode: -1,
            world_names: vec!["minecraft:overworld".to_string()],
            dimension_codec: DimensionCodec::default(),
            dimension: DimensionType::overworld(),
            world_name: "minecraft:overworld".to_string(),
            hashed_seed: 0,
            max_players: ctx.config.max_players as i32,
            view_distance: JOIN_VIEW_DISTANCE.max(2),
            reduced_debug_info: false,
            enable_respawn_screen: true,
            is_debug: false,
            is_flat: true,
        })),
    )
    .await?;

    send(
        ctx,
        handle,
        &ClientboundPacket::HeldItemChange(HeldItemChangeClientbound { slot: 0 }),
    )
    .await?;

    send(
        ctx,
        handle,
        &ClientboundPacket::DeclareRecipes(DeclareRecipes {
            recipes: starter_recipes(),
        }),
    )
    .await?;

    send(
        ctx,
        handle,
        &ClientboundPacket::DeclareCommands(command_tree()),
    )
    .await?;

    send(
        ctx,
        handle,
        &ClientboundPacket::PlayerInfo(PlayerInfo::AddPlayers(vec![PlayerInfoEntry {
            uuid:     profile.uuid,
            username: profile.username.clone(),
            gamemode: 1,
            ping:     0,
        }])),
    )
    .await?;

    send(
        ctx,
        handle,
        &ClientboundPacket::SpawnPosition(SpawnPosition { position: SPAWN }),
    )
    .await?;

    send(
        ctx,
        handle,
        &ClientboundPacket::PlayerPositionAndLook(PlayerPositionAndLook {
            x:           f64::from(SPAWN.x) + 0.5,
            y:           f64::from(SPAWN.y),
            z:           f64::from(SPAWN.z) + 0.5,
            yaw:         0.0,
            pitch:       0.0,
            flags:       0,
            teleport_id: 1,
        }),
    )
    .await?;

    send(
        ctx,
        handle,
        &ClientboundPacket::UpdateViewPosition(UpdateViewPosition {
            chunk_x: SPAWN.x >> 4,
            chunk_z: SPAWN.z >> 4,
        }),
    )
    .await?;

    let center_x = SPAWN.x >> 4;
    let center_z = SPAWN.z >> 4;
    for chunk_x in (center_x - JOIN_VIEW_DISTANCE)..=(center_x + JOIN_VIEW_DISTANCE) {
        for chunk_z in (center_z - JOIN_VIEW_DISTANCE)..=(center_z + JOIN_VIEW_DISTANCE) {
            let column = ctx.world.get_chunk(chunk_x, chunk_z);
            send(ctx, handle, &ClientboundPacket::ChunkData(column.into_packet())).await?;
        }
    }

    send(
        ctx,
        handle,
        &ClientboundPacket::TimeUpdate(TimeUpdate {
            world_age:   0,
            time_of_day: 6000,
        }),
    )
    .await?;

    debug!("[PLAY] conn={} join sequence sent", handle.id);
    Ok(())
}

/// A token recipe set exercising each body shape the registry carries.
fn starter_recipes() -> Vec<Recipe> {
    let planks = Some(ItemStack {
        item_id: 23, // oak_planks
        count:   4,
        nbt:     None,
    });
    let log = vec![Some(ItemStack {
        item_id: 73, // oak_log
        count:   1,
        nbt:     None,
    })];
    let stick = Some(ItemStack {
        item_id: 603,
        count:   4,
        nbt:     None,
    });
    let plank_one = vec![Some(ItemStack {
        item_id: 23,
        count:   1,
        nbt:     None,
    })];
    let cobblestone = vec![Some(ItemStack {
        item_id: 14,
        count:   1,
        nbt:     None,
    })];
    let stone = Some(ItemStack {
        item_id: 1,
        count:   1,
        nbt:     None,
    });

    vec![
        Recipe {
            kind: "minecraft:crafting_shapeless".to_string(),
            id:   "minecraft:oak_planks".to_string(),
            body: RecipeBody::Shapeless {
                group:       "planks".to_string(),
                ingredients: vec![log],
                result:      planks,
            },
        },
        Recipe {
            kind: "minecraft:crafting_shaped".to_string(),
            id:   "minecraft:stick".to_string(),
            body: RecipeBody::Shaped {
                width:       1,
                height:      2,
                group:       "sticks".to_string(),
                ingredients: vec![plank_one.clone(), plank_one],
                result:      stick,
            },
        },
        Recipe {
            kind: "minecraft:smelting".to_string(),
            id:   "minecraft:stone".to_string(),
            body: RecipeBody::Cooking {
                group:        String::new(),
                ingredient:   cobblestone,
                result:       stone,
                experience:   0.1,
                cooking_time: 200,
            },
        },
    ]
}

/// A minimal brigadier tree: `/help` and `/msg <target> <message>`.
fn command_tree() -> DeclareCommands {
    DeclareCommands {
        nodes:      vec![
            // 0: root
            CommandNode {
                kind:        CommandNodeKind::Root,
                executable:  false,
                children:    vec![1, 2],
                redirect:    None,
                suggestions: None,
            },
            // 1: /help
            CommandNode {
                kind:        CommandNodeKind::Literal {
                    name: "help".to_string(),
                },
                executable:  true,
                children:    vec![],
                redirect:    None,
                suggestions: None,
            },
            // 2: /msg
            CommandNode {
                kind:        CommandNodeKind::Literal {
                    name: "msg".to_string(),
                },
                executable:  false,
                children:    vec![3],
                redirect:    None,
                suggestions: None,
            },
            // 3: <target>
            CommandNode {
                kind:        CommandNodeKind::Argument {
                    name:   "target".to_string(),
                    parser: CommandParser::Entity { flags: 0x03 },
                },
                executable:  false,
                children:    vec![4],
                redirect:    None,
                suggestions: None,
            },
            // 4: <message>
            CommandNode {
                kind:        CommandNodeKind::Argument {
                    name:   "message".to_string(),
                    parser: CommandParser::String { behavior: 2 },
                },
                executable:  true,
                children:    vec![],
                redirect:    None,
                suggestions: None,
            },
        ],
        root_index: 0,
    }
}
