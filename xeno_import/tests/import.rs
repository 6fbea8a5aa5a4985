use std::{fs, path::Path, sync::Arc};

use approx::assert_relative_eq;
use glam::{Mat4, Vec3};

use xeno_import::{
    transform::axis_correction, Error, ImportSettings, Importer, Interpolation, KeySpace, Scene,
    SceneSink, TextureLocation, TextureSlot,
};
use xeno_test_utils::{
    translation_rows, AnimationSpec, BcBuilder, GeomSpec, InstanceSpec, MaterialSpec,
    MeshObjectSpec, ModelBoneSpec, ModelSpec, MorphSpec, MxmdBuilder, SarBuilder,
    SkeletonBoneSpec, TextureSpec, TrackSpec, VertexBufferSpec, WeightBufferSpec, IDENTITY_ROWS,
};

fn settings() -> ImportSettings {
    let mut settings = ImportSettings::default();
    settings.unit_scale(1.0);
    settings
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

fn translation(scene: &Scene, name: &str) -> Vec3 {
    let node = scene.find(name).unwrap();
    scene.node(node).world.transform_point3(Vec3::ZERO)
}

fn three_bones() -> Vec<u8> {
    BcBuilder::new()
        .skeleton(vec![
            SkeletonBoneSpec::new("A", -1, [0.0, 0.0, 0.0]),
            SkeletonBoneSpec::new("B", 0, [0.0, 10.0, 0.0]),
            SkeletonBoneSpec::new("C", 1, [0.0, 0.0, 5.0]),
        ])
        .build()
}

fn triangle() -> GeomSpec {
    GeomSpec {
        vertex_buffers: vec![VertexBufferSpec::new().positions(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ])],
        face_buffers: vec![vec![0, 1, 2]],
        ..GeomSpec::default()
    }
}

fn bone(name: &str, parent: i32, rows: [[f32; 4]; 4]) -> ModelBoneSpec {
    ModelBoneSpec {
        name: name.to_owned(),
        parent,
        rows,
    }
}

#[test]
fn skeleton_hierarchy() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "pc010101.skl", &three_bones());

    let mut scene = Scene::new();
    Importer::new(settings()).import(&path, &mut scene).unwrap();

    let a = scene.find("A").unwrap();
    let b = scene.find("B").unwrap();
    let c = scene.find("C").unwrap();
    assert_eq!(scene.parent(&a), None);
    assert_eq!(scene.parent(&b), Some(a));
    assert_eq!(scene.parent(&c), Some(b));
    assert_eq!(scene.find_bone(2), Some(c));

    assert_relative_eq!(translation(&scene, "A"), Vec3::ZERO);
    assert_relative_eq!(translation(&scene, "B"), Vec3::new(0.0, 0.0, 10.0));
    assert_relative_eq!(
        translation(&scene, "C"),
        Vec3::new(0.0, -5.0, 10.0),
        epsilon = 1e-5
    );
}

#[test]
fn skeleton_import_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "pc010101.skl", &three_bones());

    let importer = Importer::new(settings());
    let mut scene = Scene::new();
    importer.import(&path, &mut scene).unwrap();
    let first: Vec<_> = scene.nodes().to_vec();
    importer.import(&path, &mut scene).unwrap();

    assert_eq!(scene.nodes().len(), 3);
    for (before, after) in first.iter().zip(scene.nodes()) {
        assert_eq!(before.name, after.name);
        assert_eq!(before.parent, after.parent);
        assert_relative_eq!(before.world, after.world, epsilon = 1e-5);
    }
}

#[test]
fn skeleton_from_archive() {
    let dir = tempfile::tempdir().unwrap();
    let archive = SarBuilder::new()
        .file("readme.txt", b"not a skeleton")
        .file("pc010101.skl", &three_bones())
        .build();
    let path = write(dir.path(), "pc010101.arc", &archive);

    let mut scene = Scene::new();
    Importer::new(settings()).import(&path, &mut scene).unwrap();

    assert_eq!(scene.nodes().len(), 3);
}

#[test]
fn skeleton_file_without_skeleton() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "empty.skl",
        &BcBuilder::new().raw_record(b"XXXX", 1).build(),
    );

    let mut scene = Scene::new();
    let err = Importer::new(settings())
        .import(&path, &mut scene)
        .unwrap_err();

    assert!(matches!(err, Error::ClassNotFound { class: "skeleton", .. }));
}

#[test]
fn single_skin_bone_parents_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let model = MxmdBuilder {
        model: Some(ModelSpec {
            mesh_groups: vec![vec![MeshObjectSpec::default()]],
            bones: vec![bone("root", -1, IDENTITY_ROWS)],
            skin_bones: vec![0],
            ..ModelSpec::default()
        }),
        geometry: Some(vec![Some(triangle())]),
        ..MxmdBuilder::new()
    };
    let path = write(dir.path(), "oj000101.wimdo", &model.build());

    let mut scene = Scene::new();
    let session = Importer::new(settings()).import(&path, &mut scene).unwrap();

    assert_eq!(session.remap_nodes().len(), 1);
    let root = scene.find("root").unwrap();
    let mesh = scene.find("Object0").unwrap();
    assert_eq!(scene.parent(&mesh), Some(root));
    assert!(scene.node(mesh).skin.is_none());
    assert_eq!(scene.node(mesh).layer.as_deref(), Some("Group0"));
}

#[test]
fn skin_uses_weight_buffer_of_lod() {
    let dir = tempfile::tempdir().unwrap();
    let mut geometry = triangle();
    geometry.vertex_buffers[0] = geometry.vertex_buffers[0].clone().weight_ids(&[0, 1, 0]);
    geometry.weight_buffers = vec![
        WeightBufferSpec {
            key: 0x0005,
            weights: vec![([u16::MAX, 0, 0, 0], [0, 0, 0, 0]); 2],
        },
        WeightBufferSpec {
            key: 0x0105,
            weights: vec![
                ([u16::MAX, 0, 0, 0], [1, 0, 0, 0]),
                ([0, u16::MAX, 0, 0], [0, 1, 0, 0]),
            ],
        },
    ];

    let model = MxmdBuilder {
        model: Some(ModelSpec {
            mesh_groups: vec![vec![MeshObjectSpec {
                lod_id: 1,
                skin_desc: 5,
                ..MeshObjectSpec::default()
            }]],
            bones: vec![
                bone("root", -1, IDENTITY_ROWS),
                bone("arm", 0, translation_rows([0.0, 1.0, 0.0])),
            ],
            skin_bones: vec![0, 1],
            ..ModelSpec::default()
        }),
        geometry: Some(vec![Some(geometry)]),
        ..MxmdBuilder::new()
    };
    let path = write(dir.path(), "pc010101.wimdo", &model.build());

    let mut scene = Scene::new();
    Importer::new(settings()).import(&path, &mut scene).unwrap();

    let root = scene.find("root").unwrap();
    let arm = scene.find("arm").unwrap();
    assert_eq!(scene.parent(&arm), Some(root));
    // bind pose nodes hold the inverse of the absolute transform
    assert_relative_eq!(translation(&scene, "arm"), Vec3::new(0.0, 0.0, -1.0));

    let mesh = scene.find("Object0_SKN").unwrap();
    let node = scene.node(mesh);
    assert_eq!(node.layer.as_deref(), Some("Group0_LOD1"));

    let skin = node.skin.as_ref().unwrap();
    assert_eq!(skin.bones, [root, arm]);
    assert_eq!(skin.weights.len(), 3);
    assert_eq!(skin.weights[&0].0, [1, 0, 0, 0]);
    assert_eq!(skin.weights[&1].0, [0, 1, 0, 0]);
    assert_relative_eq!(skin.weights[&1].1[1], 1.0);
}

#[test]
fn instances_share_decoded_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let model = MxmdBuilder {
        model: Some(ModelSpec {
            mesh_groups: vec![vec![MeshObjectSpec::default()]],
            ..ModelSpec::default()
        }),
        geometry: Some(vec![Some(triangle())]),
        instances: Some(vec![
            InstanceSpec {
                rows: IDENTITY_ROWS,
                groups: vec![0],
            },
            InstanceSpec {
                rows: translation_rows([1.0, 2.0, 3.0]),
                groups: vec![0, 7, -1],
            },
            InstanceSpec {
                rows: translation_rows([5.0, 0.0, 0.0]),
                groups: vec![0],
            },
        ]),
        ..MxmdBuilder::new()
    };
    let path = write(dir.path(), "ma0101.wismhd", &model.build());

    let mut scene = Scene::new();
    Importer::new(settings()).import(&path, &mut scene).unwrap();

    let meshes: Vec<_> = scene.nodes().iter().filter(|n| n.mesh.is_some()).collect();
    assert_eq!(meshes.len(), 3);
    assert!(meshes[0].instance_of.is_none());
    assert!(meshes[1..].iter().all(|n| n.instance_of.is_some()));
    assert!(meshes
        .iter()
        .all(|n| Arc::ptr_eq(n.mesh.as_ref().unwrap(), meshes[0].mesh.as_ref().unwrap())));

    assert_relative_eq!(meshes[0].world, Mat4::IDENTITY, epsilon = 1e-6);
    assert_relative_eq!(
        meshes[1].world.transform_point3(Vec3::ZERO),
        Vec3::new(1.0, -3.0, 2.0),
        epsilon = 1e-6
    );
    assert_relative_eq!(
        meshes[2].world.transform_point3(Vec3::ZERO),
        Vec3::new(5.0, 0.0, 0.0),
        epsilon = 1e-6
    );
}

#[test]
fn morph_targets_without_matches_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mut geometry = triangle();
    geometry.morphs = vec![MorphSpec {
        source_buffer_id: 0,
        base: VertexBufferSpec::new().positions(&[
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
        ]),
        targets: vec![
            (
                0,
                VertexBufferSpec::new()
                    .morph_vertex_ids(&[1])
                    .morph_positions(&[[0.0, 1.0, 0.0]]),
            ),
            (
                1,
                VertexBufferSpec::new()
                    .morph_vertex_ids(&[7])
                    .morph_positions(&[[1.0, 1.0, 1.0]]),
            ),
            (
                2,
                VertexBufferSpec::new()
                    .morph_vertex_ids(&[2, 2])
                    .morph_positions(&[[1.0, 0.0, 0.0], [9.0, 9.0, 9.0]]),
            ),
        ],
    }];

    let model = MxmdBuilder {
        model: Some(ModelSpec {
            mesh_groups: vec![vec![MeshObjectSpec::default()]],
            morph_names: vec!["smile".to_owned(), "blink".to_owned(), String::new()],
            ..ModelSpec::default()
        }),
        geometry: Some(vec![Some(geometry)]),
        ..MxmdBuilder::new()
    };
    let path = write(dir.path(), "np000101.wimdo", &model.build());

    let mut scene = Scene::new();
    Importer::new(settings()).import(&path, &mut scene).unwrap();

    let mesh = scene.node(scene.find("Object0_MRP").unwrap());
    // base shape replaces the vertex buffer positions
    assert_relative_eq!(mesh.mesh.as_ref().unwrap().positions[1], Vec3::new(2.0, 0.0, 0.0));

    let channels = mesh.morph_channels.as_ref().unwrap();
    assert_eq!(channels.len(), 2);

    assert_eq!(channels[0].index, 0);
    assert_eq!(channels[0].name, "smile");
    assert_relative_eq!(channels[0].deltas[1], Vec3::new(0.0, 0.0, 1.0));
    assert_relative_eq!(channels[0].deltas[2], Vec3::ZERO);

    assert_eq!(channels[1].index, 1);
    assert_eq!(channels[1].name, "Morph 1");
    // first matching id wins
    assert_relative_eq!(channels[1].deltas[2], Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn morph_deltas_ignore_unit_scale() {
    let dir = tempfile::tempdir().unwrap();
    let mut geometry = triangle();
    geometry.morphs = vec![MorphSpec {
        source_buffer_id: 0,
        base: VertexBufferSpec::new().positions(&[
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
        ]),
        targets: vec![(
            0,
            VertexBufferSpec::new()
                .morph_vertex_ids(&[1])
                .morph_positions(&[[0.0, 1.0, 0.0]]),
        )],
    }];

    let model = MxmdBuilder {
        model: Some(ModelSpec {
            mesh_groups: vec![vec![MeshObjectSpec::default()]],
            morph_names: vec!["smile".to_owned()],
            ..ModelSpec::default()
        }),
        geometry: Some(vec![Some(geometry)]),
        ..MxmdBuilder::new()
    };
    let path = write(dir.path(), "np000102.wimdo", &model.build());

    let mut scene = Scene::new();
    Importer::new(ImportSettings::default())
        .import(&path, &mut scene)
        .unwrap();

    let mesh = scene.node(scene.find("Object0_MRP").unwrap());
    assert_relative_eq!(
        mesh.mesh.as_ref().unwrap().positions[1],
        Vec3::new(290.0, 0.0, 0.0)
    );

    let channels = mesh.morph_channels.as_ref().unwrap();
    assert_eq!(channels.len(), 1);
    assert_relative_eq!(channels[0].deltas[1], Vec3::new(0.0, 0.0, 1.0));
}

#[test]
fn external_textures_resolve_to_bank() {
    let dir = tempfile::tempdir().unwrap();
    let model = MxmdBuilder {
        materials: Some(vec![MaterialSpec {
            name: "body".to_owned(),
            textures: vec![0, 1, 9],
        }]),
        external_textures: Some(vec![(3, 42), (-1, 7)]),
        ..MxmdBuilder::new()
    };
    let path = write(dir.path(), "chr/pc010101.wimdo", &model.build());
    write(dir.path(), "textures/3/0042.png", b"");

    let mut scene = Scene::new();
    let session = Importer::new(settings()).import(&path, &mut scene).unwrap();

    assert_eq!(session.texture_location(), Some(TextureLocation::Bank));
    let textures = scene.textures();
    assert_eq!(textures[0].name, "3/0042");
    assert_eq!(
        textures[0].path.as_deref(),
        Some(dir.path().join("textures").join("3/0042.png").as_path())
    );
    assert_eq!(textures[1].name, "0007");
    assert_eq!(
        textures[1].path.as_deref(),
        Some(dir.path().join("textures").join("0007.dds").as_path())
    );

    // no name markers, both textures end up as composite layers
    let material = &scene.materials()[0];
    assert!(material.slots.is_empty());
    assert_eq!(material.composite.len(), 2);
}

#[test]
fn embedded_textures_are_extracted() {
    let dir = tempfile::tempdir().unwrap();
    let model = MxmdBuilder {
        materials: Some(vec![MaterialSpec {
            name: "body".to_owned(),
            textures: vec![0, 1, 2],
        }]),
        textures: Some(vec![
            TextureSpec {
                name: "body_COL".to_owned(),
                width: 2,
                height: 1,
                format: 0,
                data: vec![255, 0, 0, 255, 0, 255, 0, 255],
            },
            TextureSpec {
                name: "body_NRM".to_owned(),
                width: 1,
                height: 1,
                format: 1,
                data: vec![128, 128],
            },
            TextureSpec {
                name: "detail_COL".to_owned(),
                width: 1,
                height: 1,
                format: 0,
                data: vec![0; 4],
            },
        ]),
        ..MxmdBuilder::new()
    };
    let path = write(dir.path(), "pc010101.wimdo", &model.build());

    let mut settings = settings();
    settings.extract_textures(true);

    let mut scene = Scene::new();
    let session = Importer::new(settings).import(&path, &mut scene).unwrap();

    assert_eq!(session.texture_location(), Some(TextureLocation::Embedded));
    let extracted = dir.path().join("pc010101");
    assert!(extracted.join("body_COL.png").is_file());
    assert!(extracted.join("body_NRM.png").is_file());

    let material = &scene.materials()[0];
    let diffuse = material.slot(TextureSlot::Diffuse).unwrap();
    assert_eq!(
        scene.texture(diffuse).path.as_deref(),
        Some(extracted.join("body_COL.png").as_path())
    );
    assert!(material.slot(TextureSlot::Normal).is_some());
    // the diffuse slot is taken by the first color map
    assert_eq!(material.composite.len(), 1);
}

fn animation(positions: &[[f32; 3]]) -> Vec<u8> {
    bone_animation(vec![0, -1], positions)
}

fn bone_animation(bone_table: Vec<i16>, positions: &[[f32; 3]]) -> Vec<u8> {
    BcBuilder::new()
        .animation(AnimationSpec {
            frame_time: 0.25,
            frame_count: 4,
            cubic: false,
            bone_table,
            tracks: vec![TrackSpec::uniform(
                positions,
                &vec![[0.0, 0.0, 0.0, 1.0]; positions.len()],
                &vec![[1.0; 3]; positions.len()],
            )],
        })
        .build()
}

#[test]
fn motion_archive_selects_motion() {
    let dir = tempfile::tempdir().unwrap();
    let skeleton = write(dir.path(), "pc010101.skl", &three_bones());
    let archive = SarBuilder::new()
        .file("idle.anm", &animation(&[[0.0; 3]; 4]))
        .file("readme.txt", b"")
        .file("broken.anm", &three_bones())
        .file("walk.anm", &animation(&[[1.0, 0.0, 0.0]; 4]))
        .build();
    let motions = write(dir.path(), "pc010101.mot", &archive);

    let mut settings = settings();
    settings.motion_index(1);
    let importer = Importer::new(settings);

    let mut scene = Scene::new();
    importer.import(&skeleton, &mut scene).unwrap();
    let session = importer.import(&motions, &mut scene).unwrap();

    assert_eq!(session.motions(), ["idle.anm", "walk.anm"]);
    assert_eq!(scene.animation_range(), Some((0, 4640)));

    let root = scene.node(scene.find("A").unwrap());
    let track = root.track.as_ref().unwrap();
    assert_eq!(track.space, KeySpace::Local);
    assert_eq!(track.interpolation, Interpolation::Smooth);
    assert_eq!(track.keys.len(), 30);
    assert_eq!(track.keys.last().unwrap().tick, 4640);
    // root keys carry the axis correction
    assert_relative_eq!(
        track.keys[0].transform,
        axis_correction() * Mat4::from_translation(Vec3::X),
        epsilon = 1e-6
    );
    assert!(scene.node(scene.find("B").unwrap()).track.is_none());
}

#[test]
fn motion_index_out_of_range_uses_first() {
    let dir = tempfile::tempdir().unwrap();
    let archive = SarBuilder::new()
        .file("idle.anm", &animation(&[[2.0, 0.0, 0.0]; 4]))
        .build();
    let motions = write(dir.path(), "pc010101.mot", &archive);

    let mut settings = settings();
    settings.motion_index(5);
    settings.global_frames(true);

    let mut scene = Scene::new();
    let bone = scene.create_helper("A");
    scene.tag_bone(&bone, 0);
    let session = Importer::new(settings).import(&motions, &mut scene).unwrap();

    assert_eq!(session.motions(), ["idle.anm"]);
    let track = scene.node(bone).track.as_ref().unwrap();
    assert_eq!(track.space, KeySpace::World);
    assert_relative_eq!(
        track.keys[0].transform.transform_point3(Vec3::ZERO),
        Vec3::new(2.0, 0.0, 0.0),
        epsilon = 1e-6
    );
}

fn child_bone_track(global_frames: bool) -> (Mat4, KeySpace) {
    let dir = tempfile::tempdir().unwrap();
    let skeleton = write(dir.path(), "pc010101.skl", &three_bones());
    let archive = SarBuilder::new()
        .file("idle.anm", &bone_animation(vec![-1, 0], &[[0.0, 1.0, 2.0]; 4]))
        .build();
    let motions = write(dir.path(), "pc010101.mot", &archive);

    let mut settings = settings();
    settings.global_frames(global_frames);
    let importer = Importer::new(settings);

    let mut scene = Scene::new();
    importer.import(&skeleton, &mut scene).unwrap();
    importer.import(&motions, &mut scene).unwrap();

    assert!(scene.node(scene.find("A").unwrap()).track.is_none());
    let track = scene
        .node(scene.find("B").unwrap())
        .track
        .clone()
        .unwrap();
    assert_eq!(track.keys.len(), 30);

    (track.keys[0].transform, track.space)
}

#[test]
fn global_frames_correct_every_bone() {
    let (transform, space) = child_bone_track(true);

    assert_eq!(space, KeySpace::World);
    assert_relative_eq!(
        transform,
        axis_correction() * Mat4::from_translation(Vec3::new(0.0, 1.0, 2.0)),
        epsilon = 1e-6
    );
    assert_relative_eq!(
        transform.transform_point3(Vec3::ZERO),
        Vec3::new(0.0, -2.0, 1.0),
        epsilon = 1e-6
    );
}

#[test]
fn local_frames_leave_child_bones_uncorrected() {
    let (transform, space) = child_bone_track(false);

    assert_eq!(space, KeySpace::Local);
    assert_relative_eq!(
        transform,
        Mat4::from_translation(Vec3::new(0.0, 1.0, 2.0)),
        epsilon = 1e-6
    );
}

#[test]
fn motion_archive_without_animations() {
    let dir = tempfile::tempdir().unwrap();
    let archive = SarBuilder::new().file("a.txt", b"").build();
    let path = write(dir.path(), "empty.mot", &archive);

    let mut scene = Scene::new();
    let err = Importer::new(settings())
        .import(&path, &mut scene)
        .unwrap_err();

    assert!(matches!(err, Error::NoMotions { .. }));
}
