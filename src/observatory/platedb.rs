//! `platedb`: plate configuration and observing records shared by APO and LCO

use super::{ForeignKey, ManyToMany, SchemaDefinition, TableDefinition, PK};

const PLATE_FKS: &[ForeignKey] = &[
    fk!("current_survey_mode_pk" => "platedb.survey_mode"),
    fk!("design_pk" => "platedb.design"),
    fk!("plate_completion_status_pk" => "platedb.plate_completion_status"),
    fk!("plate_location_pk" => "platedb.plate_location"),
    fk!("plate_run_pk" => "platedb.plate_run"),
    fk!("tile_pk" => "platedb.tile"),
];

const PLATE_LINKS: &[ManyToMany] = &[
    link!("surveys", "platedb.plate_to_survey", "platedb.survey"),
    link!("statuses", "platedb.plate_to_plate_status", "platedb.plate_status"),
];

const PLUGGING_FKS: &[ForeignKey] = &[
    fk!("cartridge_pk" => "platedb.cartridge"),
    fk!("plate_pk" => "platedb.plate"),
    fk!("plugging_status_pk" => "platedb.plugging_status"),
];

const PLUGGING_LINKS: &[ManyToMany] = &[link!(
    "instruments",
    "platedb.plugging_to_instrument",
    "platedb.instrument",
)];

const EXPOSURE_FKS: &[ForeignKey] = &[
    fk!("camera_pk" => "platedb.camera"),
    fk!("exposure_flavor_pk" => "platedb.exposure_flavor"),
    fk!("exposure_status_pk" => "platedb.exposure_status"),
    fk!("observation_pk" => "platedb.observation"),
    fk!("survey_mode_pk" => "platedb.survey_mode"),
    fk!("survey_pk" => "platedb.survey"),
];

const PLATE_HOLE_FKS: &[ForeignKey] = &[
    fk!("object_type_pk" => "platedb.object_type"),
    fk!("plate_hole_type_pk" => "platedb.plate_hole_type"),
    fk!("plate_holes_file_pk" => "platedb.plate_holes_file"),
];

pub static PLATEDB: SchemaDefinition = SchemaDefinition {
    name: "platedb",
    tables: &[
        table!("cartridge", PK, &[]),
        table!("design", PK, &[]),
        table!("plate_completion_status", PK, &[]),
        table!("plate_location", PK, &[]),
        table!("plate_run", PK, &[]),
        table!("tile_status", PK, &[]),
        table!(
            "tile",
            PK,
            &[fk!("tile_status_pk" => "platedb.tile_status")],
        ),
        table!("survey_mode", PK, &[]),
        table!("survey", PK, &[]),
        table!("plate_status", PK, &[]),
        TableDefinition {
            name: "plate",
            primary_key: PK,
            foreign_keys: PLATE_FKS,
            links: PLATE_LINKS,
        },
        table!("plugging_status", PK, &[]),
        table!("instrument", PK, &[]),
        TableDefinition {
            name: "plugging",
            primary_key: PK,
            foreign_keys: PLUGGING_FKS,
            links: PLUGGING_LINKS,
        },
        table!(
            "active_plugging",
            PK,
            &[fk!("plugging_pk" => "platedb.plugging")],
        ),
        table!("apogee_threshold", PK, &[]),
        table!(
            "boss_plugging_info",
            PK,
            &[fk!("plugging_pk" => "platedb.plugging")],
        ),
        table!(
            "camera",
            PK,
            &[fk!("instrument_pk" => "platedb.instrument")],
        ),
        table!(
            "boss_sn2_threshold",
            PK,
            &[fk!("camera_pk" => "platedb.camera")],
        ),
        table!("exposure_flavor", PK, &[]),
        table!("exposure_status", PK, &[]),
        table!("pointing", PK, &[fk!("design_pk" => "platedb.design")]),
        table!(
            "plate_pointing",
            PK,
            &[
                fk!("plate_pk" => "platedb.plate"),
                fk!("pointing_pk" => "platedb.pointing"),
            ],
        ),
        table!("observation_status", PK, &[]),
        table!(
            "observation",
            PK,
            &[
                fk!("observation_status_pk" => "platedb.observation_status"),
                fk!("plate_pointing_pk" => "platedb.plate_pointing"),
                fk!("plugging_pk" => "platedb.plugging"),
            ],
        ),
        table!("exposure", PK, EXPOSURE_FKS),
        table!(
            "camera_frame",
            PK,
            &[
                fk!("camera_pk" => "platedb.camera"),
                fk!("exposure_pk" => "platedb.exposure"),
            ],
        ),
        table!("cmm_meas", PK, &[fk!("plate_pk" => "platedb.plate")]),
        table!("constants", &["name"], &[]),
        table!("design_field", PK, &[]),
        table!(
            "design_value",
            PK,
            &[
                fk!("design_field_pk" => "platedb.design_field"),
                fk!("design_pk" => "platedb.design"),
            ],
        ),
        table!("exposure_header_keyword", PK, &[]),
        table!(
            "exposure_header_value",
            PK,
            &[
                fk!("exposure_header_keyword_pk" => "platedb.exposure_header_keyword"),
                fk!("exposure_pk" => "platedb.exposure"),
            ],
        ),
        table!(
            "pl_plugmap_m",
            PK,
            &[fk!("plugging_pk" => "platedb.plugging")],
        ),
        table!("object_type", PK, &[]),
        table!("plate_hole_type", PK, &[]),
        table!(
            "plate_holes_file",
            PK,
            &[fk!("plate_pk" => "platedb.plate")],
        ),
        table!("plate_hole", PK, PLATE_HOLE_FKS),
        table!(
            "fiber",
            PK,
            &[
                fk!("pl_plugmap_m_pk" => "platedb.pl_plugmap_m"),
                fk!("plate_hole_pk" => "platedb.plate_hole"),
            ],
        ),
        table!("gprobe", PK, &[fk!("cartridge_pk" => "platedb.cartridge")]),
        table!(
            "hole_meas",
            PK,
            &[
                fk!("cmm_meas_pk" => "platedb.cmm_meas"),
                fk!("plate_hole_pk" => "platedb.plate_hole"),
            ],
        ),
        table!(
            "plate_completion_status_history",
            PK,
            &[
                fk!("plate_completion_status_pk" => "platedb.plate_completion_status"),
                fk!("plate_pk" => "platedb.plate"),
            ],
        ),
        table!("plate_input", PK, &[fk!("design_pk" => "platedb.design")]),
        // plain integer columns, no constraints in the database
        table!("plate_run_to_design", PK, &[]),
        table!(
            "plate_to_plate_status",
            PK,
            &[
                fk!("plate_pk" => "platedb.plate"),
                fk!("plate_status_pk" => "platedb.plate_status"),
            ],
        ),
        table!(
            "plate_to_survey",
            PK,
            &[
                fk!("plate_pk" => "platedb.plate"),
                fk!("survey_pk" => "platedb.survey"),
            ],
        ),
        table!(
            "plugging_to_boss_sn2_threshold",
            &["boss_sn2_threshold_version", "plugging_pk"],
            &[],
        ),
        table!(
            "plugging_to_instrument",
            PK,
            &[
                fk!("instrument_pk" => "platedb.instrument"),
                fk!("plugging_pk" => "platedb.plugging"),
            ],
        ),
        table!("pointing_status", PK, &[]),
        table!(
            "prof_tolerances",
            PK,
            &[fk!("survey_pk" => "platedb.survey")],
        ),
        table!(
            "profilometry",
            PK,
            &[
                fk!("plugging_pk" => "platedb.plugging"),
                fk!("prof_tolerances_pk" => "platedb.prof_tolerances"),
            ],
        ),
        table!(
            "prof_measurement",
            PK,
            &[fk!("profilometry_pk" => "platedb.profilometry")],
        ),
        table!("test", PK, &[]),
        table!(
            "tile_status_history",
            PK,
            &[
                fk!("tile_pk" => "platedb.tile"),
                fk!("tile_status_pk" => "platedb.tile_status"),
            ],
        ),
    ],
};
